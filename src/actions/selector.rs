//! Seat selectors for action actors and executors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{ActionId, KernelError, PlayerId, Result, Scalar, Value};
use crate::eval::Bindings;

/// Which seats a selector designates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerSelector {
    /// The seat whose turn it is.
    #[default]
    Active,
    /// Every seat.
    Any,
    /// Every seat except the active one.
    AllOther,
    Id(PlayerId),
    Ids(Vec<PlayerId>),
    /// A move param holding a seat index or an array of them.
    Binding(String),
}

impl fmt::Display for PlayerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Any => f.write_str("any"),
            Self::AllOther => f.write_str("allOther"),
            Self::Id(id) => write!(f, "{id}"),
            Self::Ids(ids) => {
                let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", ids.join(","))
            }
            Self::Binding(name) => f.write_str(name),
        }
    }
}

impl PlayerSelector {
    /// Resolve to seats in index order.
    ///
    /// A selector that cannot resolve (dangling seat, missing or mistyped
    /// binding) is an `INVALID_SELECTOR_SPEC` error, not an illegal move.
    pub fn resolve(
        &self,
        action_id: &ActionId,
        active: PlayerId,
        player_count: usize,
        bindings: &Bindings,
    ) -> Result<Vec<PlayerId>> {
        let invalid = |message: String| KernelError::InvalidSelectorSpec {
            action_id: action_id.clone(),
            selector: self.to_string(),
            message,
        };
        let checked = |seat: i64| {
            PlayerId::from_index(seat, player_count)
                .ok_or_else(|| invalid(format!("seat {seat} is out of range for {player_count} players")))
        };

        let mut seats = match self {
            Self::Active => vec![active],
            Self::Any => PlayerId::all(player_count).collect(),
            Self::AllOther => PlayerId::all(player_count).filter(|p| *p != active).collect(),
            Self::Id(id) => vec![checked(id.index() as i64)?],
            Self::Ids(ids) => {
                if ids.is_empty() {
                    return Err(invalid("empty seat list".to_string()));
                }
                ids.iter()
                    .map(|id| checked(id.index() as i64))
                    .collect::<Result<Vec<_>>>()?
            }
            Self::Binding(name) => match bindings.get(name) {
                None => return Err(invalid(format!("`{name}` is not bound"))),
                Some(Value::Scalar(Scalar::Int(seat))) => vec![checked(*seat)?],
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| match item {
                        Scalar::Int(seat) => checked(*seat),
                        other => Err(invalid(format!("`{other}` is not a seat index"))),
                    })
                    .collect::<Result<Vec<_>>>()?,
                Some(other) => return Err(invalid(format!("`{other}` is not a seat index"))),
            },
        };
        seats.sort_unstable();
        seats.dedup();
        Ok(seats)
    }

    /// Resolve to exactly one seat.
    pub fn resolve_one(
        &self,
        action_id: &ActionId,
        active: PlayerId,
        player_count: usize,
        bindings: &Bindings,
    ) -> Result<PlayerId> {
        let seats = self.resolve(action_id, active, player_count, bindings)?;
        match seats.as_slice() {
            [seat] => Ok(*seat),
            _ => Err(KernelError::InvalidSelectorSpec {
                action_id: action_id.clone(),
                selector: self.to_string(),
                message: format!("expected exactly one seat, got {}", seats.len()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(selector: &PlayerSelector, bindings: &Bindings) -> Result<Vec<PlayerId>> {
        selector.resolve(&ActionId::new("act"), PlayerId(1), 3, bindings)
    }

    #[test]
    fn test_resolution() {
        let empty = Bindings::new();
        assert_eq!(resolve(&PlayerSelector::Active, &empty).unwrap(), vec![PlayerId(1)]);
        assert_eq!(resolve(&PlayerSelector::Any, &empty).unwrap().len(), 3);
        assert_eq!(
            resolve(&PlayerSelector::AllOther, &empty).unwrap(),
            vec![PlayerId(0), PlayerId(2)]
        );
        assert_eq!(
            resolve(&PlayerSelector::Ids(vec![PlayerId(2), PlayerId(0), PlayerId(2)]), &empty).unwrap(),
            vec![PlayerId(0), PlayerId(2)]
        );
    }

    #[test]
    fn test_binding_selector() {
        let bindings = Bindings::new().with("$target", Value::int(2));
        let selector = PlayerSelector::Binding("$target".to_string());
        assert_eq!(resolve(&selector, &bindings).unwrap(), vec![PlayerId(2)]);

        let err = resolve(&selector, &Bindings::new()).unwrap_err();
        assert_eq!(err.code(), "INVALID_SELECTOR_SPEC");
    }

    #[test]
    fn test_out_of_range_is_invalid_spec() {
        let err = resolve(&PlayerSelector::Id(PlayerId(7)), &Bindings::new()).unwrap_err();
        assert_eq!(err.code(), "INVALID_SELECTOR_SPEC");
        let err = resolve(&PlayerSelector::Ids(vec![]), &Bindings::new()).unwrap_err();
        assert_eq!(err.code(), "INVALID_SELECTOR_SPEC");
    }

    #[test]
    fn test_resolve_one() {
        let err = PlayerSelector::Any
            .resolve_one(&ActionId::new("act"), PlayerId(0), 2, &Bindings::new())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SELECTOR_SPEC");
    }
}
