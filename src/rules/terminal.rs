//! Game-end detection.
//!
//! End conditions are checked in declaration order and the first that holds
//! decides the result. Card-driven definitions may add victory checkpoints:
//! every `during` checkpoint is checked before any `final` one, and a final
//! checkpoint ranks seats by their victory margins.

use serde::{Deserialize, Serialize};

use crate::core::{GameState, PlayerId, Result, Value};
use crate::def::{
    CheckpointTiming, DefRuntime, EndResultDef, GameDef, TurnOrderDef, VictoryCheckpoint,
    VictoryConfig,
};
use crate::eval::{eval_condition, eval_int, resolve_player, Bindings, EvalContext};

/// A seat's final score or victory margin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerScore {
    pub player: PlayerId,
    pub score: i64,
}

/// Which victory checkpoint ended the game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryInfo {
    pub checkpoint: String,
    pub timing: CheckpointTiming,
    /// Margin ranking, best first; empty when no margins are declared.
    pub ranking: Vec<PlayerScore>,
}

/// How a finished game ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminalResult {
    Draw,
    /// Every seat loses.
    LossAll,
    Win {
        player: PlayerId,
        #[serde(default)]
        victory: Option<VictoryInfo>,
    },
    /// Seats ranked best first.
    Score { ranking: Vec<PlayerScore> },
}

impl TerminalResult {
    /// Check if a seat won (the top of a score ranking counts as winning).
    #[must_use]
    pub fn is_winner(&self, player: PlayerId) -> bool {
        match self {
            Self::Win { player: winner, .. } => *winner == player,
            Self::Score { ranking } => ranking.first().is_some_and(|s| s.player == player),
            Self::Draw | Self::LossAll => false,
        }
    }
}

/// The result if `state` is terminal, `None` while the game continues.
pub fn terminal_result(
    def: &GameDef,
    runtime: &DefRuntime,
    state: &GameState,
) -> Result<Option<TerminalResult>> {
    let empty = Bindings::new();
    let ctx = EvalContext::new(def, runtime, state, &empty, state.active_player);

    for (i, end) in def.end_conditions.iter().enumerate() {
        let holds = eval_condition(&end.when, &ctx)
            .map_err(|e| e.in_predicate(format!("end condition {i}")))?;
        if !holds {
            continue;
        }
        let result = match &end.result {
            EndResultDef::Draw => TerminalResult::Draw,
            EndResultDef::LossAll => TerminalResult::LossAll,
            EndResultDef::Win { player } => TerminalResult::Win {
                player: resolve_player(player, &ctx)?,
                victory: None,
            },
            EndResultDef::Score { value, ascending } => {
                let mut ranking = Vec::with_capacity(state.player_count());
                for player in PlayerId::all(state.player_count()) {
                    let bindings = Bindings::new().with("$player", Value::int(player.index() as i64));
                    let seat_ctx = EvalContext::new(def, runtime, state, &bindings, player);
                    ranking.push(PlayerScore {
                        player,
                        score: eval_int(value, &seat_ctx)?,
                    });
                }
                if *ascending {
                    ranking.sort_by_key(|s| s.score);
                } else {
                    ranking.sort_by_key(|s| std::cmp::Reverse(s.score));
                }
                TerminalResult::Score { ranking }
            }
        };
        tracing::debug!(condition = i, ?result, "end condition met");
        return Ok(Some(result));
    }

    if let TurnOrderDef::CardDriven(config) = &def.turn_order {
        if let Some(victory) = &config.victory {
            return check_victory(victory, &ctx);
        }
    }
    Ok(None)
}

fn check_victory(victory: &VictoryConfig, ctx: &EvalContext<'_>) -> Result<Option<TerminalResult>> {
    let ordered = victory
        .checkpoints
        .iter()
        .filter(|c| c.timing == CheckpointTiming::During)
        .chain(victory.checkpoints.iter().filter(|c| c.timing == CheckpointTiming::Final));

    for checkpoint in ordered {
        let holds = eval_condition(&checkpoint.when, ctx)
            .map_err(|e| e.in_predicate(format!("victory checkpoint `{}`", checkpoint.id)))?;
        if holds {
            return Ok(Some(victory_result(victory, checkpoint, ctx)?));
        }
    }
    Ok(None)
}

fn victory_result(
    victory: &VictoryConfig,
    checkpoint: &VictoryCheckpoint,
    ctx: &EvalContext<'_>,
) -> Result<TerminalResult> {
    let ranking = margin_ranking(victory, ctx)?;
    let ranked_first = ranking.first().map(|s| s.player);
    let player = match checkpoint.timing {
        CheckpointTiming::During => checkpoint.seat.or(ranked_first),
        CheckpointTiming::Final => ranked_first.or(checkpoint.seat),
    }
    .unwrap_or(ctx.state.active_player);

    tracing::debug!(checkpoint = %checkpoint.id, winner = %player, "victory checkpoint met");
    Ok(TerminalResult::Win {
        player,
        victory: Some(VictoryInfo {
            checkpoint: checkpoint.id.clone(),
            timing: checkpoint.timing,
            ranking,
        }),
    })
}

/// Margins best first; ties keep declaration order.
fn margin_ranking(victory: &VictoryConfig, ctx: &EvalContext<'_>) -> Result<Vec<PlayerScore>> {
    let mut ranking = Vec::with_capacity(victory.margins.len());
    for margin in &victory.margins {
        let bindings = Bindings::new().with("$player", Value::int(margin.seat.index() as i64));
        let score = eval_int(&margin.value, &ctx.with_bindings(&bindings))
            .map_err(|e| e.in_predicate(format!("victory margin of {}", margin.seat)))?;
        ranking.push(PlayerScore {
            player: margin.seat,
            score,
        });
    }
    ranking.sort_by_key(|s| std::cmp::Reverse(s.score));
    Ok(ranking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{CardDrivenConfig, EndCondition, VarDef, VictoryMargin};
    use crate::eval::{Condition, PlayerRef, ValueExpr};

    fn def_with_score() -> GameDef {
        let mut def = GameDef::minimal("terminal");
        def.global_vars.push(VarDef::int("round", 0, 0, 10));
        def.per_player_vars.push(VarDef::int("vp", 0, 0, 50));
        def
    }

    #[test]
    fn test_running_game_is_not_terminal() {
        let def = def_with_score();
        let runtime = DefRuntime::new(&def);
        let state = GameState::new(&def, 2, 0).unwrap();
        assert_eq!(terminal_result(&def, &runtime, &state).unwrap(), None);
    }

    #[test]
    fn test_first_holding_condition_wins() {
        let mut def = def_with_score();
        def.end_conditions.push(EndCondition {
            when: Condition::ge(ValueExpr::global("round"), ValueExpr::Int(3)),
            result: EndResultDef::Draw,
        });
        def.end_conditions.push(EndCondition {
            when: Condition::Const(true),
            result: EndResultDef::Win {
                player: PlayerRef::Id(PlayerId(1)),
            },
        });
        let runtime = DefRuntime::new(&def);
        let mut state = GameState::new(&def, 2, 0).unwrap();
        assert_eq!(
            terminal_result(&def, &runtime, &state).unwrap(),
            Some(TerminalResult::Win {
                player: PlayerId(1),
                victory: None
            })
        );
        state.global_vars.insert("round".to_string(), 3);
        assert_eq!(terminal_result(&def, &runtime, &state).unwrap(), Some(TerminalResult::Draw));
    }

    #[test]
    fn test_score_ranking() {
        let mut def = def_with_score();
        def.end_conditions.push(EndCondition {
            when: Condition::Const(true),
            result: EndResultDef::Score {
                value: ValueExpr::player_var(PlayerRef::Binding("$player".to_string()), "vp"),
                ascending: false,
            },
        });
        let runtime = DefRuntime::new(&def);
        let mut state = GameState::new(&def, 3, 0).unwrap();
        if let Some(vars) = state.player_vars.get_mut(PlayerId(2)) {
            vars.insert("vp".to_string(), 7);
        }
        let result = terminal_result(&def, &runtime, &state).unwrap().unwrap();
        let TerminalResult::Score { ranking } = &result else {
            panic!("expected a score result, got {result:?}");
        };
        assert_eq!(ranking[0], PlayerScore { player: PlayerId(2), score: 7 });
        // Ties keep seat order.
        assert_eq!(ranking[1].player, PlayerId(0));
        assert!(result.is_winner(PlayerId(2)));
    }

    #[test]
    fn test_victory_checkpoints() {
        let mut def = def_with_score();
        let mut config = CardDrivenConfig::new(vec![PlayerId(0), PlayerId(1)]);
        config.victory = Some(VictoryConfig {
            checkpoints: vec![
                VictoryCheckpoint {
                    id: "final".to_string(),
                    seat: None,
                    timing: CheckpointTiming::Final,
                    when: Condition::ge(ValueExpr::global("round"), ValueExpr::Int(5)),
                },
                VictoryCheckpoint {
                    id: "sweep".to_string(),
                    seat: Some(PlayerId(0)),
                    timing: CheckpointTiming::During,
                    when: Condition::ge(ValueExpr::global("round"), ValueExpr::Int(8)),
                },
            ],
            margins: vec![
                VictoryMargin {
                    seat: PlayerId(0),
                    value: ValueExpr::Int(2),
                },
                VictoryMargin {
                    seat: PlayerId(1),
                    value: ValueExpr::global("round"),
                },
            ],
        });
        def.turn_order = TurnOrderDef::CardDriven(config);
        let runtime = DefRuntime::new(&def);
        let mut state = GameState::new(&def, 2, 0).unwrap();
        assert_eq!(terminal_result(&def, &runtime, &state).unwrap(), None);

        state.global_vars.insert("round".to_string(), 5);
        let Some(TerminalResult::Win { player, victory }) = terminal_result(&def, &runtime, &state).unwrap() else {
            panic!("expected a win");
        };
        assert_eq!(player, PlayerId(1));
        assert_eq!(victory.unwrap().checkpoint, "final");

        // Both hold; the during checkpoint is checked first.
        state.global_vars.insert("round".to_string(), 9);
        let Some(TerminalResult::Win { player, victory }) = terminal_result(&def, &runtime, &state).unwrap() else {
            panic!("expected a win");
        };
        assert_eq!(player, PlayerId(0));
        assert_eq!(victory.unwrap().checkpoint, "sweep");
    }
}
