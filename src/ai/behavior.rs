use std::collections::HashMap;

use serde::Deserialize;

use crate::world::ActorTemplate;

/// How a hostile monster reacts to players within its aggro range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Behavior {
    /// Chases down its target and attacks it.
    #[default]
    Aggressive,
    /// Attacks whatever is next to it, but never leaves its tile.
    Guard,
    /// Never does anything on its own.
    Passive,
}

impl Behavior {
    pub fn attacks(self) -> bool {
        match self {
            Behavior::Aggressive | Behavior::Guard => true,
            Behavior::Passive => false,
        }
    }

    pub fn pursues(self) -> bool {
        match self {
            Behavior::Aggressive => true,
            Behavior::Guard | Behavior::Passive => false,
        }
    }
}

/// Which behavior each template uses. Built once at startup and owned by the controller.
#[derive(Debug, Clone, Default)]
pub struct BehaviorRegistry {
    behaviors: HashMap<u32, Behavior>,
}

impl BehaviorRegistry {
    pub fn from_templates(templates: &[ActorTemplate]) -> Self {
        Self {
            behaviors: templates
                .iter()
                .map(|template| (template.id, template.behavior))
                .collect(),
        }
    }

    pub fn register(&mut self, template_id: u32, behavior: Behavior) {
        self.behaviors.insert(template_id, behavior);
    }

    /// Unknown templates are `Aggressive`.
    pub fn get(&self, template_id: u32) -> Behavior {
        self.behaviors
            .get(&template_id)
            .copied()
            .unwrap_or_default()
    }
}
