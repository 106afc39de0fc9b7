//! Status and classification enums for orders, workers and stock.
//!
//! Every enum here is stored as text in `PostgreSQL` (guarded by `CHECK`
//! constraints) and round-trips through [`Display`](core::fmt::Display) and
//! [`FromStr`](core::str::FromStr) using the same spelling as its serde form.

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Name of the enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `ALL`, `Display` and `FromStr` for a fieldless enum.
macro_rules! text_enum {
    ($name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The canonical text form, as stored in the database.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Production status of an order.
///
/// ```text
/// KIRITILDI ──approve──▶ TASDIQLANDI ──worker_accept──▶ USTA_QABUL_QILDI
///     │                      │                               │
///   reject             start_production                worker_start
///     ▼                      ▼                               ▼
/// RAD_ETILDI*              ISHDA ◀───────────────────── USTA_BOSHLA
///                            │        worker_finish          │
///                            ├───────────────────────▶ USTA_TUGATDI
///                        mark_ready                          │
///                            ▼          mark_ready           │
///                         TAYYOR ◀───────────────────────────┘
///                            │
///                         complete
///                            ▼
///                       BAJARILDI*
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Entered, awaiting manager approval.
    #[default]
    Kiritildi,
    /// Approved by a manager.
    Tasdiqlandi,
    /// Rejected by a manager (terminal).
    RadEtildi,
    /// Accepted by the assigned worker.
    UstaQabulQildi,
    /// Worker started the job.
    UstaBoshla,
    /// Released to production by the production lead.
    Ishda,
    /// Worker finished the job.
    UstaTugatdi,
    /// Ready, awaiting quality check.
    Tayyor,
    /// Done (terminal).
    Bajarildi,
}

text_enum!(OrderStatus, "order status" {
    Kiritildi => "KIRITILDI",
    Tasdiqlandi => "TASDIQLANDI",
    RadEtildi => "RAD_ETILDI",
    UstaQabulQildi => "USTA_QABUL_QILDI",
    UstaBoshla => "USTA_BOSHLA",
    Ishda => "ISHDA",
    UstaTugatdi => "USTA_TUGATDI",
    Tayyor => "TAYYOR",
    Bajarildi => "BAJARILDI",
});

impl OrderStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::RadEtildi | Self::Bajarildi)
    }

    /// Whether the deadline scan should still chase this order.
    ///
    /// Ready orders are waiting on quality control, not on a worker.
    #[must_use]
    pub const fn is_overdue_candidate(&self) -> bool {
        !self.is_terminal() && !matches!(self, Self::Tayyor)
    }

    /// Human-readable label used in notifications.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Kiritildi => "1. Kiritildi",
            Self::Tasdiqlandi => "2. Tasdiqlandi",
            Self::RadEtildi => "2. Rad Etildi",
            Self::UstaQabulQildi => "3. Usta Qabul Qildi",
            Self::UstaBoshla => "4. Usta Boshladi",
            Self::Ishda => "5. Ishlab Chiqarishda",
            Self::UstaTugatdi => "6. Usta Yakunladi",
            Self::Tayyor => "7. Tayyor",
            Self::Bajarildi => "8. Bajarildi",
        }
    }
}

/// Production stage an order belongs to, and the role of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerType {
    /// Sheet metal work.
    List,
    /// Door work.
    Eshik,
    /// Combined sheet and door work.
    ListEshik,
    /// Sandwich panel assembly.
    Panel,
    /// Corner trim work.
    Ugol,
}

text_enum!(WorkerType, "worker type" {
    List => "LIST",
    Eshik => "ESHIK",
    ListEshik => "LIST_ESHIK",
    Panel => "PANEL",
    Ugol => "UGOL",
});

impl WorkerType {
    /// The production stage that follows this one, if any.
    #[must_use]
    pub const fn next_stage(&self) -> Option<Self> {
        match self {
            Self::List | Self::Eshik | Self::ListEshik => Some(Self::Panel),
            Self::Panel => Some(Self::Ugol),
            Self::Ugol => None,
        }
    }

    /// Whether orders of this type must carry a full door specification.
    #[must_use]
    pub const fn requires_door_spec(&self) -> bool {
        matches!(self, Self::Eshik | Self::ListEshik)
    }
}

/// Authorization role of a user acting on the production core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including editing orders and acting for workers.
    Admin,
    /// Approves, rejects and closes orders.
    Manager,
    /// Releases orders to production and marks them ready.
    ProductionLead,
    /// Performs assigned production work.
    Worker,
    /// Read-only access.
    Observer,
}

text_enum!(Role, "role" {
    Admin => "admin",
    Manager => "manager",
    ProductionLead => "production_lead",
    Worker => "worker",
    Observer => "observer",
});

/// Sandwich panel core material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PanelType {
    /// Polyurethane core.
    Pur,
    /// Polyisocyanurate core.
    Pir,
}

text_enum!(PanelType, "panel type" {
    Pur => "PUR",
    Pir => "PIR",
});

/// PIR panel product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PanelSubtype {
    /// Roof panel.
    Tom,
    /// Hidden-fastener wall panel.
    Secretpir,
    /// Cold-room panel.
    Sovutgich,
}

text_enum!(PanelSubtype, "panel subtype" {
    Tom => "TOM",
    Secretpir => "SECRETPIR",
    Sovutgich => "SOVUTGICH",
});

impl PanelSubtype {
    /// Thicknesses (mm) this product line is manufactured in.
    #[must_use]
    pub const fn allowed_thicknesses(&self) -> &'static [i32] {
        match self {
            Self::Tom => &[5],
            Self::Secretpir => &[5, 8],
            Self::Sovutgich => &[5, 10, 15],
        }
    }
}

/// Standard thicknesses (mm) for PUR panels and doors.
pub const STANDARD_THICKNESSES: &[i32] = &[5, 8, 10, 15];

/// Door opening direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoorDirection {
    /// Hinged on the left, seen from outside.
    Left,
    /// Hinged on the right, seen from outside.
    Right,
}

text_enum!(DoorDirection, "door direction" {
    Left => "LEFT",
    Right => "RIGHT",
});

/// Unit of measure for a stocked material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    /// Mass, kilograms.
    Kg,
    /// Area, square metres.
    M2,
    /// Count, pieces.
    #[default]
    Son,
    /// Length, metres.
    M,
    /// Volume, litres.
    Litr,
}

text_enum!(UnitOfMeasure, "unit of measure" {
    Kg => "kg",
    M2 => "m2",
    Son => "son",
    M => "m",
    Litr => "litr",
});

/// Direction of a stock journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionDirection {
    /// Receipt into stock.
    In,
    /// Consumption out of stock.
    Out,
}

text_enum!(TransactionDirection, "transaction direction" {
    In => "IN",
    Out => "OUT",
});

/// Which evidence photo an order slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSlot {
    /// Photo taken when the worker accepts the job.
    Start,
    /// Photo taken when the worker finishes the job.
    Finish,
}

text_enum!(EvidenceSlot, "evidence slot" {
    Start => "start",
    Finish => "finish",
});
