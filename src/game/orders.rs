//! Order types, wire-order parsing and batch classification.
//!
//! Every submitted order lands in exactly one bucket: valid, ignored or
//! invalid. Classification is a two-pass algorithm: a forward pass scores
//! each order against the batch context, then a downgrade pass applies the
//! retroactive rules (step-limit overruns invalidate earlier accepted
//! moves; a pirate acting twice gets all its orders ignored).

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::game::location::Location;
use crate::game::pirate::PirateId;

/// What an accepted order does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    /// Sail to a destination square.
    Move {
        /// Destination square.
        destination: Location,
    },
    /// Fire at an enemy pirate.
    Attack {
        /// Target pirate id.
        target: PirateId,
    },
    /// Raise the defense aura.
    Defense,
    /// Turn invisible for a while.
    Cloak,
    /// Summon a bermuda zone around the pirate.
    Bermuda,
}

/// An accepted order: an acting pirate plus what it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    /// The acting pirate.
    pub pirate: PirateId,
    /// What it does.
    pub kind: OrderKind,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OrderKind::Move { destination } => {
                write!(f, "pirate {} move to ({}, {})", self.pirate, destination.row, destination.col)
            }
            OrderKind::Attack { target } => {
                write!(f, "pirate {} attack {}", self.pirate, target)
            }
            OrderKind::Defense => write!(f, "pirate {} defense", self.pirate),
            OrderKind::Cloak => write!(f, "pirate {} cloak", self.pirate),
            OrderKind::Bermuda => write!(f, "pirate {} bermuda", self.pirate),
        }
    }
}

/// A wire order that passed format validation.
///
/// Field values are still unchecked: a missing pirate or a bad argument
/// shape is a semantic error, classified later against game state.
#[derive(Debug, Clone)]
pub(crate) struct RawOrder {
    /// The original wire value, kept for diagnostics.
    pub(crate) display: String,
    /// The claimed order type; `None` when it was not a string.
    pub(crate) order_type: Option<String>,
    /// The acting pirate id; `None` when it was not a non-negative integer.
    pub(crate) acting_pirate: Option<PirateId>,
    /// The order arguments object.
    pub(crate) args: serde_json::Map<String, Value>,
}

impl RawOrder {
    /// The `target` argument of an attack, when present and non-null.
    ///
    /// The returned id is still unchecked against living pirates; a
    /// non-integer value comes back as an id that matches nothing.
    pub(crate) fn attack_target(&self) -> Option<&Value> {
        if self.args.len() != 1 {
            return None;
        }
        let target = self.args.get("target")?;
        if target.is_null() { None } else { Some(target) }
    }

    /// The `destination` argument of a move, when well-formed.
    pub(crate) fn move_destination(&self) -> Option<Location> {
        if self.args.len() != 1 {
            return None;
        }
        let destination = self.args.get("destination")?.as_array()?;
        if destination.len() != 2 {
            return None;
        }
        let row = i32::try_from(destination[0].as_i64()?).ok()?;
        let col = i32::try_from(destination[1].as_i64()?).ok()?;
        Some(Location::new(row, col))
    }
}

/// Parse one entry of a bot's order list.
///
/// Returns `Ok(None)` for debug entries (`message`/`stop`) that bots are
/// allowed to interleave with orders.
///
/// # Errors
///
/// Returns a reason string when the entry violates the order format.
pub(crate) fn parse_raw(value: &Value) -> Result<Option<RawOrder>, String> {
    let Some(object) = value.as_object() else {
        return Err("incorrectly formatted order".to_string());
    };
    match object.get("type").and_then(Value::as_str) {
        Some("order") => {}
        Some("message" | "stop") => return Ok(None),
        _ => return Err("unknown action".to_string()),
    }
    if object.len() != 4 {
        return Err("incorrectly formatted order".to_string());
    }
    let Some(order_type) = object.get("order_type") else {
        return Err("no order type".to_string());
    };
    let Some(acting_pirate) = object.get("acting_pirate") else {
        return Err("no acting pirate".to_string());
    };
    let Some(args) = object.get("order_args") else {
        return Err("no order args".to_string());
    };
    let Some(args) = args.as_object() else {
        return Err("incorrectly formatted order".to_string());
    };

    Ok(Some(RawOrder {
        display: value.to_string(),
        order_type: order_type.as_str().map(str::to_string),
        acting_pirate: acting_pirate
            .as_u64()
            .and_then(|id| usize::try_from(id).ok()),
        args: args.clone(),
    }))
}

/// Outcome of classifying one order against the batch context.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// The order is part of the player's batch for this turn.
    Accepted(Order),
    /// Rule-legal but currently impossible; dropped.
    Ignored(String),
    /// Rule-illegal; dropped, fatal in strict mode.
    Invalid(String),
    /// The move pushed the step budget over its limit; dropped and
    /// retroactively invalidates earlier accepted moves.
    StepLimitExceeded(String),
    /// The pirate already acted this turn; dropped and retroactively
    /// ignores the pirate's earlier orders.
    AlreadyActed {
        /// The pirate that acted twice.
        pirate: PirateId,
        /// The reason string.
        reason: String,
    },
}

/// Scratch state threaded through one player's batch.
#[derive(Debug, Default)]
pub struct BatchContext {
    /// Pirates that already have an accepted order this turn.
    pub acting_pirates: HashSet<PirateId>,
    /// Movement steps spent so far this turn.
    pub action_counter: i32,
    /// Whether a bermuda summon was already accepted this turn.
    pub bermuda_summoned: bool,
    /// Whether a cloak was already accepted this turn.
    pub cloaked: bool,
}

/// The classified batch: the authoritative order list plus rejection
/// diagnostics for the bot.
#[derive(Debug, Default)]
pub struct OrderReport {
    /// Accepted orders, in submission order.
    pub valid: Vec<Order>,
    /// Reasons for ignored orders.
    pub ignored: Vec<String>,
    /// Reasons for invalid orders.
    pub invalid: Vec<String>,
}

fn ignored_message(display: &str, reason: &str) -> String {
    format!("The order: '{display}' was ignored # {reason}")
}

fn invalid_message(display: &str, reason: &str) -> String {
    format!("The order: '{display}' is invalid # {reason}")
}

/// Apply the retroactive downgrade rules over a classified batch.
///
/// `entries` pairs each order's display form with its forward-pass
/// verdict, in submission order.
pub(crate) fn finalize_batch(entries: Vec<(String, Verdict)>) -> OrderReport {
    let mut report = OrderReport::default();
    // accepted orders still standing, with their display form
    let mut valid: Vec<(String, Order)> = Vec::new();
    let mut move_orders_removed = false;
    let mut cascaded_pirates: Vec<PirateId> = Vec::new();

    for (display, verdict) in entries {
        match verdict {
            Verdict::Accepted(order) => valid.push((display, order)),
            Verdict::Ignored(reason) => report.ignored.push(ignored_message(&display, &reason)),
            Verdict::Invalid(reason) => report.invalid.push(invalid_message(&display, &reason)),
            Verdict::StepLimitExceeded(reason) => {
                report.invalid.push(invalid_message(&display, &reason));
                if !move_orders_removed {
                    move_orders_removed = true;
                    valid.retain(|(kept_display, kept)| {
                        if matches!(kept.kind, OrderKind::Move { .. }) {
                            report.invalid.push(invalid_message(kept_display, &reason));
                            false
                        } else {
                            true
                        }
                    });
                }
            }
            Verdict::AlreadyActed { pirate, reason } => {
                report.ignored.push(ignored_message(&display, &reason));
                if !cascaded_pirates.contains(&pirate) {
                    cascaded_pirates.push(pirate);
                    valid.retain(|(kept_display, kept)| {
                        if kept.pirate == pirate {
                            report.ignored.push(ignored_message(kept_display, &reason));
                            false
                        } else {
                            true
                        }
                    });
                }
            }
        }
    }

    report.valid = valid.into_iter().map(|(_, order)| order).collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn accepted(pirate: PirateId, kind: OrderKind) -> (String, Verdict) {
        let order = Order { pirate, kind };
        (order.to_string(), Verdict::Accepted(order))
    }

    #[test]
    fn test_parse_raw_valid_move() {
        let value = json!({
            "type": "order",
            "order_type": "move",
            "acting_pirate": 2,
            "order_args": {"destination": [3, 4]},
        });
        let raw = parse_raw(&value).expect("format ok").expect("is an order");
        assert_eq!(raw.order_type.as_deref(), Some("move"));
        assert_eq!(raw.acting_pirate, Some(2));
        assert_eq!(raw.move_destination(), Some(Location::new(3, 4)));
    }

    #[test]
    fn test_parse_raw_skips_debug_entries() {
        let value = json!({"type": "message", "message": "hi"});
        assert!(parse_raw(&value).expect("format ok").is_none());
    }

    #[test]
    fn test_parse_raw_rejects_unknown_type() {
        let value = json!({"type": "dance"});
        assert_eq!(parse_raw(&value).unwrap_err(), "unknown action");
    }

    #[test]
    fn test_parse_raw_rejects_missing_fields() {
        let value = json!({
            "type": "order",
            "order_type": "move",
            "acting_pirate": 2,
            "extra": 0,
        });
        assert_eq!(parse_raw(&value).unwrap_err(), "no order args");
    }

    #[test]
    fn test_parse_raw_rejects_extra_fields() {
        let value = json!({
            "type": "order",
            "order_type": "move",
            "acting_pirate": 2,
            "order_args": {},
            "extra": 0,
        });
        assert_eq!(parse_raw(&value).unwrap_err(), "incorrectly formatted order");
    }

    #[test]
    fn test_bad_destination_shapes() {
        let value = json!({
            "type": "order",
            "order_type": "move",
            "acting_pirate": 0,
            "order_args": {"destination": [1, 2, 3]},
        });
        let raw = parse_raw(&value).expect("format ok").expect("is an order");
        assert_eq!(raw.move_destination(), None);
    }

    #[test]
    fn test_step_limit_invalidates_earlier_moves_only_once() {
        let reason = "too many steps".to_string();
        let entries = vec![
            accepted(0, OrderKind::Move { destination: Location::new(1, 1) }),
            accepted(1, OrderKind::Defense),
            ("move 2".to_string(), Verdict::StepLimitExceeded(reason.clone())),
            accepted(2, OrderKind::Move { destination: Location::new(2, 2) }),
            ("move 3".to_string(), Verdict::StepLimitExceeded(reason)),
        ];
        let report = finalize_batch(entries);
        // the defense and the move accepted after the first overrun survive
        assert_eq!(report.valid.len(), 2);
        assert!(matches!(report.valid[0].kind, OrderKind::Defense));
        assert!(matches!(report.valid[1].kind, OrderKind::Move { .. }));
        // two overruns plus one cascaded move
        assert_eq!(report.invalid.len(), 3);
    }

    #[test]
    fn test_already_acted_ignores_both_orders() {
        let entries = vec![
            accepted(4, OrderKind::Defense),
            (
                "second".to_string(),
                Verdict::AlreadyActed {
                    pirate: 4,
                    reason: "pirate can't do more than 1 order each turn".to_string(),
                },
            ),
        ];
        let report = finalize_batch(entries);
        assert!(report.valid.is_empty());
        assert_eq!(report.ignored.len(), 2);
    }

    #[test]
    fn test_already_acted_cascades_once_per_pirate() {
        let already = |reason: &str| Verdict::AlreadyActed {
            pirate: 4,
            reason: reason.to_string(),
        };
        let entries = vec![
            accepted(4, OrderKind::Defense),
            ("second".to_string(), already("dup")),
            ("third".to_string(), already("dup")),
        ];
        let report = finalize_batch(entries);
        assert!(report.valid.is_empty());
        // one per rejected order plus a single cascaded entry
        assert_eq!(report.ignored.len(), 3);
    }
}
