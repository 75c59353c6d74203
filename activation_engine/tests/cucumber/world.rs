use std::collections::HashMap;

use activation_engine::db_types::{Transaction, TransactionId};
use cucumber::World;

use crate::support::Harness;

#[derive(Debug, Default, World)]
pub struct EngineWorld {
    pub system: Option<Harness>,
    /// Orders by the label the feature file gave them
    pub orders: HashMap<String, TransactionId>,
    pub last_error: Option<String>,
    pub event_counter: u64,
}

impl EngineWorld {
    pub fn system(&self) -> &Harness {
        self.system.as_ref().expect("Engine not initialised. Start the scenario with 'Given a fresh engine'")
    }

    pub fn order_id(&self, label: &str) -> TransactionId {
        self.orders.get(label).cloned().unwrap_or_else(|| panic!("No order labelled {label}"))
    }

    pub async fn order(&self, label: &str) -> Transaction {
        let id = self.order_id(label);
        self.system().checkout.transaction(&id).await.expect("Error fetching order").expect("Order vanished")
    }

    pub fn next_event_id(&mut self) -> String {
        self.event_counter += 1;
        format!("evt_{:04}", self.event_counter)
    }
}
