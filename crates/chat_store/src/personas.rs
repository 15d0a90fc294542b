//! Persona lookup trait and the in-memory implementation

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use chat_core::Persona;

use crate::error::Result;

#[async_trait]
pub trait PersonaStore: Send + Sync {
    async fn get_persona(&self, persona_id: u64) -> Result<Option<Persona>>;
}

#[derive(Default)]
pub struct MemoryPersonaStore {
    personas: Mutex<HashMap<u64, Persona>>,
}

impl MemoryPersonaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_persona(&self, persona: Persona) {
        self.personas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(persona.id, persona);
    }
}

#[async_trait]
impl PersonaStore for MemoryPersonaStore {
    async fn get_persona(&self, persona_id: u64) -> Result<Option<Persona>> {
        Ok(self
            .personas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&persona_id)
            .cloned())
    }
}
