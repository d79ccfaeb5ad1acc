//! Booking core services on top of the entity models.
//! - Slot calendar: fixed-grid daily time slots per bay, with lifecycle.
//! - Bay queue: ordered same-day wait list with derived ETA estimates.
//! - Draft wizard: multi-step booking selection with cascading resets.
//! - Booking flow: finalize/cancel orchestration consuming the three cores.

pub mod errors;
pub mod slot_calendar;
pub mod bay_queue;
pub mod draft_wizard;
pub mod booking_flow;
#[cfg(test)]
pub mod test_support;
