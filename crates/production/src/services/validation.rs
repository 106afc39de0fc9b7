//! Structural validation of order specs.
//!
//! Every rule is checked and every failing field reported, so the caller can
//! render all problems at once. Validation has no side effects.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use eco_prom_core::{Money, PanelType, STANDARD_THICKNESSES};

use crate::models::{DoorSpec, OrderSpec, PanelSpec};

/// Fractional digits allowed for area.
const AREA_SCALE: u32 = 2;

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as submitted (`panel_thickness`, `door_width`, ...).
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

/// All failing fields of a submitted spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Record a failure. Only the first failure per field is kept.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        if !self.has(field) {
            self.errors.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    /// Whether a field has failed.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Message for a field, if it failed.
    #[must_use]
    pub fn message(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Failing fields in the order they were found.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.errors
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid order")?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} {}", error.field, error.message)?;
        }
        Ok(())
    }
}

/// When a spec is being checked.
#[derive(Debug, Clone, Copy)]
pub enum ValidationMode {
    /// A new order; the deadline must not already have passed.
    Create { now: DateTime<Utc> },
    /// An edit of an existing order; the deadline is not re-checked.
    Update,
}

/// Validate an order spec.
///
/// # Errors
///
/// Returns every failing field.
pub fn validate_order(spec: &OrderSpec, mode: ValidationMode) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if spec.customer_name.trim().is_empty() {
        errors.add("customer_name", "is required");
    }

    check_panel(&spec.panel, &mut errors);
    check_door(spec, &mut errors);
    check_amounts(spec, &mut errors);

    if let (ValidationMode::Create { now }, Some(deadline)) = (mode, spec.deadline)
        && deadline < now
    {
        errors.add("deadline", "must not be in the past");
    }

    errors.into_result()
}

/// Check that a worker's finish time does not precede their start time.
///
/// # Errors
///
/// Fails on `worker_finished_at`.
pub fn validate_work_interval(
    started_at: Option<DateTime<Utc>>,
    finished_at: DateTime<Utc>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if started_at.is_some_and(|started| finished_at < started) {
        errors.add("worker_finished_at", "must not be before worker_started_at");
    }
    errors.into_result()
}

fn format_thicknesses(allowed: &[i32]) -> String {
    allowed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn check_thickness(thickness: Option<i32>, allowed: &[i32], errors: &mut ValidationErrors) {
    match thickness {
        None => errors.add("panel_thickness", "is required"),
        Some(t) if !allowed.contains(&t) => errors.add(
            "panel_thickness",
            format!("must be one of {} mm, got {t}", format_thicknesses(allowed)),
        ),
        Some(_) => {}
    }
}

fn check_panel(panel: &PanelSpec, errors: &mut ValidationErrors) {
    match (panel.panel_type, panel.subtype) {
        (Some(PanelType::Pur), subtype) => {
            if subtype.is_some() {
                errors.add("panel_subtype", "only PIR panels have a subtype");
            }
            check_thickness(panel.thickness, STANDARD_THICKNESSES, errors);
        }
        (Some(PanelType::Pir), None) => {
            errors.add("panel_subtype", "is required for PIR panels");
        }
        (Some(PanelType::Pir), Some(subtype)) => {
            check_thickness(panel.thickness, subtype.allowed_thicknesses(), errors);
        }
        (None, Some(_)) => {
            errors.add("panel_subtype", "requires panel_type PIR");
        }
        (None, None) => {}
    }
}

fn is_blank(value: Option<&String>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn check_dimension(field: &'static str, value: Option<i32>, required: bool, errors: &mut ValidationErrors) {
    match value {
        None if required => errors.add(field, "is required"),
        Some(v) if v <= 0 => errors.add(field, "must be positive"),
        _ => {}
    }
}

fn check_door(spec: &OrderSpec, errors: &mut ValidationErrors) {
    let door: &DoorSpec = &spec.door;
    let required = spec.worker_type.requires_door_spec();

    if required {
        if is_blank(door.door_type.as_ref()) {
            errors.add("door_type", "is required");
        }
        if is_blank(door.frame_type.as_ref()) {
            errors.add("door_frame_type", "is required");
        }
        if door.direction.is_none() {
            errors.add("door_direction", "is required");
        }
        check_thickness(spec.panel.thickness, STANDARD_THICKNESSES, errors);
    }

    check_dimension("door_height", door.height, required, errors);
    check_dimension("door_width", door.width, required, errors);
}

fn check_amounts(spec: &OrderSpec, errors: &mut ValidationErrors) {
    if spec.area.is_sign_negative() && !spec.area.is_zero() {
        errors.add("area", "must not be negative");
    } else if spec.area.normalize().scale() > AREA_SCALE {
        errors.add("area", format!("allows at most {AREA_SCALE} decimal places"));
    }

    for (field, amount) in [("total_price", spec.total_price), ("prepayment", spec.prepayment)] {
        if let Err(e) = Money::try_new(amount) {
            errors.add(field, e.to_string());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use eco_prom_core::{DoorDirection, PanelSubtype, WorkerType};
    use rust_decimal::Decimal;

    use super::*;

    fn spec(worker_type: WorkerType) -> OrderSpec {
        OrderSpec {
            customer_name: "Baraka Qurilish".to_owned(),
            product_name: None,
            worker_type,
            panel: PanelSpec::default(),
            door: DoorSpec::default(),
            area: Decimal::new(12050, 2),
            total_price: Decimal::new(1_000_000, 2),
            prepayment: Decimal::new(250_000, 2),
            deadline: None,
            comment: None,
            drawing_reference: None,
        }
    }

    fn pir(subtype: PanelSubtype, thickness: i32) -> PanelSpec {
        PanelSpec {
            panel_type: Some(PanelType::Pir),
            subtype: Some(subtype),
            thickness: Some(thickness),
        }
    }

    fn full_door() -> DoorSpec {
        DoorSpec {
            door_type: Some("metal".to_owned()),
            frame_type: Some("angle".to_owned()),
            direction: Some(DoorDirection::Left),
            height: Some(2100),
            width: Some(900),
        }
    }

    #[test]
    fn test_plain_list_order_is_valid() {
        assert!(validate_order(&spec(WorkerType::List), ValidationMode::Update).is_ok());
    }

    #[test]
    fn test_pir_tom_rejects_eight_mm() {
        let mut s = spec(WorkerType::Panel);
        s.panel = pir(PanelSubtype::Tom, 8);
        let errors = validate_order(&s, ValidationMode::Update).unwrap_err();
        assert_eq!(errors.fields().len(), 1);
        assert_eq!(errors.message("panel_thickness"), Some("must be one of 5 mm, got 8"));
    }

    #[test]
    fn test_pir_subtype_thickness_table() {
        let cases = [
            (PanelSubtype::Tom, 5, true),
            (PanelSubtype::Secretpir, 5, true),
            (PanelSubtype::Secretpir, 8, true),
            (PanelSubtype::Secretpir, 10, false),
            (PanelSubtype::Sovutgich, 5, true),
            (PanelSubtype::Sovutgich, 8, false),
            (PanelSubtype::Sovutgich, 15, true),
        ];
        for (subtype, thickness, ok) in cases {
            let mut s = spec(WorkerType::Panel);
            s.panel = pir(subtype, thickness);
            assert_eq!(
                validate_order(&s, ValidationMode::Update).is_ok(),
                ok,
                "{subtype} {thickness}"
            );
        }
    }

    #[test]
    fn test_pir_requires_subtype() {
        let mut s = spec(WorkerType::Panel);
        s.panel = PanelSpec {
            panel_type: Some(PanelType::Pir),
            subtype: None,
            thickness: Some(5),
        };
        let errors = validate_order(&s, ValidationMode::Update).unwrap_err();
        assert!(errors.has("panel_subtype"));
    }

    #[test]
    fn test_pur_thickness_and_stray_subtype() {
        let mut s = spec(WorkerType::List);
        s.panel = PanelSpec {
            panel_type: Some(PanelType::Pur),
            subtype: Some(PanelSubtype::Tom),
            thickness: Some(12),
        };
        let errors = validate_order(&s, ValidationMode::Update).unwrap_err();
        assert!(errors.has("panel_subtype"));
        assert!(errors.has("panel_thickness"));
    }

    #[test]
    fn test_door_types_need_full_door_spec() {
        let s = spec(WorkerType::Eshik);
        let errors = validate_order(&s, ValidationMode::Update).unwrap_err();
        for field in [
            "door_type",
            "door_frame_type",
            "door_direction",
            "door_height",
            "door_width",
            "panel_thickness",
        ] {
            assert!(errors.has(field), "{field} should fail");
        }

        let mut s = spec(WorkerType::ListEshik);
        s.door = full_door();
        s.panel.thickness = Some(10);
        assert!(validate_order(&s, ValidationMode::Update).is_ok());
    }

    #[test]
    fn test_door_dimensions_must_be_positive() {
        let mut s = spec(WorkerType::Eshik);
        s.door = DoorSpec {
            width: Some(0),
            ..full_door()
        };
        s.panel.thickness = Some(5);
        let errors = validate_order(&s, ValidationMode::Update).unwrap_err();
        assert_eq!(errors.message("door_width"), Some("must be positive"));
        assert!(!errors.has("door_height"));
    }

    #[test]
    fn test_unrelated_fields_not_reported() {
        let mut s = spec(WorkerType::Panel);
        s.panel = pir(PanelSubtype::Tom, 8);
        let errors = validate_order(&s, ValidationMode::Update).unwrap_err();
        assert!(!errors.has("customer_name"));
        assert!(!errors.has("door_type"));
    }

    #[test]
    fn test_deadline_only_checked_on_create() {
        let now = Utc::now();
        let mut s = spec(WorkerType::List);
        s.deadline = Some(now - Duration::hours(1));
        let errors = validate_order(&s, ValidationMode::Create { now }).unwrap_err();
        assert!(errors.has("deadline"));
        assert!(validate_order(&s, ValidationMode::Update).is_ok());

        s.deadline = Some(now + Duration::days(3));
        assert!(validate_order(&s, ValidationMode::Create { now }).is_ok());
    }

    #[test]
    fn test_amount_rules() {
        let mut s = spec(WorkerType::List);
        s.customer_name = "  ".to_owned();
        s.area = Decimal::new(-1, 0);
        s.total_price = Decimal::new(1005, 3);
        s.prepayment = Decimal::new(-5, 0);
        let errors = validate_order(&s, ValidationMode::Update).unwrap_err();
        for field in ["customer_name", "area", "total_price", "prepayment"] {
            assert!(errors.has(field), "{field} should fail");
        }
    }

    #[test]
    fn test_display_lists_fields() {
        let mut errors = ValidationErrors::default();
        errors.add("area", "must not be negative");
        errors.add("deadline", "must not be in the past");
        errors.add("area", "ignored duplicate");
        assert_eq!(
            errors.to_string(),
            "invalid order: area must not be negative; deadline must not be in the past"
        );
    }

    #[test]
    fn test_work_interval() {
        let start = Utc::now();
        assert!(validate_work_interval(Some(start), start).is_ok());
        assert!(validate_work_interval(None, start).is_ok());
        let errors = validate_work_interval(Some(start), start - Duration::seconds(1)).unwrap_err();
        assert!(errors.has("worker_finished_at"));
    }
}
