//! Ending resolution. First matching condition wins and the last entry is the fallback.

use thiserror::Error;
use tracing::debug;

use crate::schema::game::Ending;
use crate::schema::meter::MeterVector;
use crate::schema::unlock::UnlockSet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no ending matched and no fallback ending exists")]
    MissingEndingFallback,
}

/// Select exactly one ending for a final state.
///
/// Endings are scanned in declared order and the first whose condition
/// holds is returned. The last entry is returned unconditionally when
/// nothing before it matches, so ordering must run from most specific to
/// most general. Only an empty list fails.
pub fn resolve<'a>(
    meters: &MeterVector,
    unlocks: &UnlockSet,
    endings: &'a [Ending],
) -> Result<&'a Ending, ResolveError> {
    let (fallback, candidates) = endings
        .split_last()
        .ok_or(ResolveError::MissingEndingFallback)?;

    for ending in candidates {
        if ending.condition.evaluate(meters, unlocks) {
            debug!(ending = %ending.id, "ending condition matched");
            return Ok(ending);
        }
    }

    debug!(ending = %fallback.id, "no ending condition matched, using fallback");
    Ok(fallback)
}
