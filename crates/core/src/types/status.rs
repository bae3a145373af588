//! Roles and lifecycle statuses.
//!
//! Order and delivery statuses carry their own transition tables. Handlers
//! never write a status directly; they ask the current status whether the
//! move is legal and which role may make it, then persist it with a
//! compare-and-set on the previous value.

use serde::{Deserialize, Serialize};

/// Generates `Display`, `FromStr` and `as_str` for a snake_case string enum.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// The wire and database spelling of this value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Account role. Every user has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bazaar.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shops, keeps a cart, places orders.
    #[default]
    Customer,
    /// Owns a store and its products.
    Merchant,
    /// Delivery partner fulfilling orders.
    Delivery,
}

string_enum!(UserRole {
    Customer => "customer",
    Merchant => "merchant",
    Delivery => "delivery",
});

/// Order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bazaar.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Placed,
    Accepted,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Rejected,
    Cancelled,
}

string_enum!(OrderStatus {
    Placed => "placed",
    Accepted => "accepted",
    Preparing => "preparing",
    ReadyForPickup => "ready_for_pickup",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Statuses an order may move to from `self`.
    #[must_use]
    pub const fn next_statuses(self) -> &'static [Self] {
        match self {
            Self::Placed => &[Self::Accepted, Self::Rejected, Self::Cancelled],
            Self::Accepted => &[Self::Preparing, Self::Cancelled],
            Self::Preparing => &[Self::ReadyForPickup],
            Self::ReadyForPickup => &[Self::OutForDelivery],
            Self::OutForDelivery => &[Self::Delivered],
            Self::Delivered | Self::Rejected | Self::Cancelled => &[],
        }
    }

    /// Whether `self → next` is a legal move.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next_statuses().contains(&next)
    }

    /// The role that performs a move *into* `self`.
    ///
    /// `Placed` is only ever written by checkout, so it has no actor.
    #[must_use]
    pub const fn actor(self) -> Option<UserRole> {
        match self {
            Self::Placed => None,
            Self::Accepted | Self::Rejected | Self::Preparing | Self::ReadyForPickup => {
                Some(UserRole::Merchant)
            }
            Self::OutForDelivery | Self::Delivered => Some(UserRole::Delivery),
            Self::Cancelled => Some(UserRole::Customer),
        }
    }

    /// Validate a transition requested by `role`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] when the move is not in the table
    /// and [`TransitionError::WrongActor`] when another role owns it.
    pub fn transition(self, next: Self, role: UserRole) -> Result<Self, TransitionError> {
        if !self.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        match next.actor() {
            Some(actor) if actor == role => Ok(next),
            _ => Err(TransitionError::WrongActor {
                to: next.as_str(),
                role: role.as_str(),
            }),
        }
    }

    /// No further transitions possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.next_statuses().is_empty()
    }

    /// Cancelled or rejected orders give their stock back.
    #[must_use]
    pub const fn releases_stock(self) -> bool {
        matches!(self, Self::Cancelled | Self::Rejected)
    }
}

/// Delivery lifecycle for a single partner assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bazaar.delivery_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Assigned,
    PickedUp,
    Delivered,
    Rejected,
    Cancelled,
}

string_enum!(DeliveryStatus {
    Assigned => "assigned",
    PickedUp => "picked_up",
    Delivered => "delivered",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

impl DeliveryStatus {
    /// Whether `self → next` is a legal move.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Assigned, Self::PickedUp | Self::Rejected | Self::Cancelled)
                | (Self::PickedUp, Self::Delivered)
        )
    }

    /// The partner is still working on this delivery.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::PickedUp)
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] when the move is not allowed.
    pub fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError::Illegal {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bazaar.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash collected by the delivery partner.
    Cod,
    /// Paid through Razorpay.
    Online,
}

string_enum!(PaymentMethod {
    Cod => "cod",
    Online => "online",
});

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bazaar.order_payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

string_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// State of a single Razorpay payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bazaar.provider_payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPaymentStatus {
    #[default]
    Created,
    Captured,
    Failed,
    Refunded,
}

string_enum!(ProviderPaymentStatus {
    Created => "created",
    Captured => "captured",
    Failed => "failed",
    Refunded => "refunded",
});

/// Cash-on-delivery collection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bazaar.cod_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CodStatus {
    /// Partner holds the cash.
    #[default]
    Collected,
    /// Merchant confirmed receipt.
    Confirmed,
}

string_enum!(CodStatus {
    Collected => "collected",
    Confirmed => "confirmed",
});

/// Merchant payout state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "bazaar.settlement_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    #[default]
    Pending,
    Paid,
}

string_enum!(SettlementStatus {
    Pending => "pending",
    Paid => "paid",
});

/// A rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The move is not in the transition table.
    #[error("cannot move from {from} to {to}")]
    Illegal {
        from: &'static str,
        to: &'static str,
    },
    /// The move is legal but belongs to another role.
    #[error("a {role} cannot move an order to {to}")]
    WrongActor {
        to: &'static str,
        role: &'static str,
    },
}
