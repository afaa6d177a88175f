//! Equipment argument resolution.
//!
//! Maps an authored equipment token ("stove", "Sink", "Pot", an id...) onto the
//! id of a concrete record in the current snapshot. Pure: reads the snapshot,
//! never mutates it, keeps nothing between calls.
//!
//! Lookup order for a token:
//! 1. "stove"/"stoves" (any case): first unoccupied Stove counter, else the first Stove counter.
//! 2. A record whose id equals the token: the token is returned as-is.
//! 3. A record whose type equals the token, categories in [`Category::ALL`] order.
//! 4. A counter whose occupant has that type, or failing that that name.

use super::state::{Category, EquipmentRecord, WorldState};
use crate::plan::types::TaskArg;
use thiserror::Error;
use tracing::debug;

const STOVE_TYPE: &str = "Stove";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no stoves found in the environment")]
    NoStoves,
    #[error("no equipment found for type or id '{token}'")]
    NoEquipment { token: String },
}

pub fn resolve(arg: &TaskArg, state: &WorldState) -> Result<TaskArg, ResolutionError> {
    match arg {
        TaskArg::Token(token) => resolve_token(token, state).map(TaskArg::Token),
        other => Ok(other.clone()),
    }
}

pub fn resolve_token(token: &str, state: &WorldState) -> Result<String, ResolutionError> {
    if is_stove_token(token) {
        return resolve_stove(state);
    }

    if state.iter_records().any(|r| r.id == token) {
        return Ok(token.to_string());
    }

    for category in Category::ALL {
        if let Some(record) = state.records(category).iter().find(|r| r.kind == token) {
            debug!("'{}' matched {} in {}", token, record.id, category.field());
            return Ok(record.id.clone());
        }
    }

    if let Some(counter) = find_by_occupant(state.records(Category::Counters), token) {
        debug!("'{}' matched the occupant of {}", token, counter.id);
        return Ok(counter.id.clone());
    }

    Err(ResolutionError::NoEquipment {
        token: token.to_string(),
    })
}

fn is_stove_token(token: &str) -> bool {
    let lower = token.to_lowercase();
    lower == "stove" || lower == "stoves"
}

/// Free stoves first; a busy stove beats failing the step.
fn resolve_stove(state: &WorldState) -> Result<String, ResolutionError> {
    let counters = state.records(Category::Counters);
    let mut stoves = counters.iter().filter(|c| c.kind == STOVE_TYPE).peekable();

    let first = stoves.peek().map(|c| c.id.clone());
    if let Some(free) = stoves.find(|c| !c.is_occupied()) {
        return Ok(free.id.clone());
    }
    first.ok_or(ResolutionError::NoStoves)
}

fn find_by_occupant<'a>(counters: &'a [EquipmentRecord], token: &str) -> Option<&'a EquipmentRecord> {
    counters.iter().find(|counter| {
        counter.occupant().is_some_and(|occupant| {
            occupant.kind.as_deref() == Some(token) || occupant.name.as_deref() == Some(token)
        })
    })
}
