//! Cart slice: current lines, badge count and the last cart error.

use serde::{Deserialize, Serialize};

use super::Status;
use crate::models::CartItem;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartState {
    pub status: Status,
    #[serde(skip)]
    pub items: Vec<CartItem>,
    /// Total units, kept between requests for the header badge.
    pub item_count: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CartAction {
    Pending,
    Loaded(Vec<CartItem>),
    Rejected(String),
    /// The owner changed (sign-in or sign-out); the next load refills the cart.
    Reset,
}

impl CartState {
    pub fn reduce(&mut self, action: CartAction) {
        match action {
            CartAction::Pending => {
                self.status = Status::Loading;
                self.error = None;
            }
            CartAction::Loaded(items) => {
                self.status = Status::Succeeded;
                self.item_count = items.iter().map(|i| i.quantity).sum();
                self.items = items;
                self.error = None;
            }
            CartAction::Rejected(message) => {
                self.status = Status::Failed;
                self.error = Some(message);
            }
            CartAction::Reset => *self = Self::default(),
        }
    }

    pub const fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}
