//! Single-call worker roles: one prompt in, one artifact out.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::Capability;
use crate::dispatch::{BackendFamily, CapabilityDispatcher};
use crate::errors::DispatchError;

/// Defines the high-level system design, data models, technology stack and
/// modular breakdown. A creative, verbose model suits this role.
pub struct ArchitectWorker {
    dispatcher: Arc<CapabilityDispatcher>,
}

impl ArchitectWorker {
    pub fn new(dispatcher: Arc<CapabilityDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Capability for ArchitectWorker {
    async fn execute(&self, input: &str) -> Result<String, DispatchError> {
        info!("generating system architecture");
        let prompt = format!(
            "Based on the following requirements, design a high-level system \
             architecture, including the technology stack, data models, and a \
             modular breakdown:\n\n{input}"
        );
        self.dispatcher.invoke(BackendFamily::Claude, &prompt).await
    }
}

/// Designs the database schema and example queries from the data models.
pub struct DatabaseWorker {
    dispatcher: Arc<CapabilityDispatcher>,
}

impl DatabaseWorker {
    pub fn new(dispatcher: Arc<CapabilityDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Capability for DatabaseWorker {
    async fn execute(&self, input: &str) -> Result<String, DispatchError> {
        info!("generating database schema");
        let prompt = format!(
            "Based on the following data models, design a normalized SQL \
             database schema (DDL). Also, provide example SELECT, INSERT, \
             UPDATE, and DELETE queries for the primary tables.\n\n\
             --- Data Models ---\n{input}"
        );
        self.dispatcher.invoke(BackendFamily::Gemini, &prompt).await
    }
}

/// Specifies accessible front-end structure for a component, WCAG first.
pub struct UiUxWorker {
    dispatcher: Arc<CapabilityDispatcher>,
}

impl UiUxWorker {
    pub fn new(dispatcher: Arc<CapabilityDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Capability for UiUxWorker {
    async fn execute(&self, input: &str) -> Result<String, DispatchError> {
        info!("generating UI/UX specification");
        let prompt = format!(
            "Design the HTML structure for the following UI component. Ensure \
             it is fully WCAG compliant. Specifically, include `<label>` tags \
             for all form inputs and use appropriate ARIA roles where \
             necessary. Provide the HTML structure and a list of \
             accessibility considerations.\n\n\
             --- Component Description ---\n{input}"
        );
        self.dispatcher.invoke(BackendFamily::Claude, &prompt).await
    }
}

/// Reviews code for vulnerabilities and suggests security-focused fixes.
pub struct SecurityWorker {
    dispatcher: Arc<CapabilityDispatcher>,
}

impl SecurityWorker {
    pub fn new(dispatcher: Arc<CapabilityDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Capability for SecurityWorker {
    async fn execute(&self, input: &str) -> Result<String, DispatchError> {
        info!("analyzing code for security vulnerabilities");
        let prompt = format!(
            "Review the following code for security vulnerabilities. Focus on \
             common issues like injection flaws, improper error handling, and \
             insecure dependencies. Provide a list of findings with suggested \
             fixes:\n\n```\n{input}\n```"
        );
        self.dispatcher.invoke(BackendFamily::Gemini, &prompt).await
    }
}

/// Produces docstrings, setup guides and operational documentation.
pub struct DocumentationWorker {
    dispatcher: Arc<CapabilityDispatcher>,
}

impl DocumentationWorker {
    pub fn new(dispatcher: Arc<CapabilityDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Capability for DocumentationWorker {
    async fn execute(&self, input: &str) -> Result<String, DispatchError> {
        info!("generating documentation");
        let prompt = format!(
            "Given the following code, please generate comprehensive \
             documentation. This should include: \
             1. A high-level description of the module's purpose. \
             2. Docstrings for all public classes and functions. \
             3. A 'How to Run' section, including how to run the unit tests. \
             4. A list of dependencies.\n\n--- Code ---\n{input}"
        );
        self.dispatcher.invoke(BackendFamily::Claude, &prompt).await
    }
}
