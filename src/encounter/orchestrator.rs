//! The turn-sequencing state machine
//!
//! The orchestrator is the single writer of the combat state. Each turn
//! runs TurnStart -> ActorDeciding -> ActionResolution -> TurnEnd; a
//! player turn suspends at ActorDeciding until a command arrives, a
//! non-player turn resolves immediately with configurable presentation
//! delays. Combat end is checked after every resolved action, not only
//! at turn boundaries.

use std::time::Duration;

use crate::ai::{self, ActionIntent};
use crate::core::config::EncounterConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::CombatantId;
use crate::dice::{Advantage, DiceFormula, DiceRoller};
use crate::encounter::commands::{CommandOutcome, MoveMode, PlayerCommand};
use crate::encounter::settlement::{build_outcome, EncounterOutcome};
use crate::encounter::state::{ActiveBanner, CombatEventKind, CombatState};
use crate::engine::combatant::{
    AttackProfile, Combatant, StatusEffect, StatusEffectKind,
};
use crate::engine::resolution::{apply_damage, apply_healing, resolve_attack};
use crate::grid::map::CombatGrid;
use crate::grid::pathfinding::find_path;
use crate::grid::position::GridPosition;
use crate::mechanics::{passive_perception, proficiency_bonus, resolve_check, resolve_save, Ability, Skill};
use crate::narrative::formatter;
use crate::persist::CombatStore;

/// What one `process_turn` call produced
#[derive(Debug)]
pub enum TurnOutcome {
    /// The current actor is a player; waiting for a command
    AwaitingPlayer,
    /// A non-player turn ran to completion
    TurnComplete,
    /// The encounter ended during this turn
    CombatEnded(EncounterOutcome),
    /// A turn was already in flight; this call did nothing
    Ignored,
}

/// Owns the combat state for the lifetime of one encounter
pub struct Orchestrator {
    state: Option<CombatState>,
    config: EncounterConfig,
    dice: DiceRoller,
    store: Option<Box<dyn CombatStore>>,
    turn_in_flight: bool,
    awaiting_player: bool,
}

impl Orchestrator {
    pub fn new(config: EncounterConfig, dice: DiceRoller) -> Self {
        Self {
            state: None,
            config,
            dice,
            store: None,
            turn_in_flight: false,
            awaiting_player: false,
        }
    }

    /// Attach a store; the state is saved after every turn boundary
    pub fn with_store(mut self, store: Box<dyn CombatStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> Option<&CombatState> {
        self.state.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Roll initiative, deploy both sides into their start zones, and
    /// create the combat state
    pub fn start_encounter(
        &mut self,
        party: Vec<Combatant>,
        monsters: Vec<Combatant>,
        grid: Option<CombatGrid>,
    ) -> Result<()> {
        if self.state.is_some() {
            return Err(EngineError::InvalidCommand(
                "an encounter is already running".into(),
            ));
        }
        if party.is_empty() || monsters.is_empty() {
            return Err(EngineError::InvalidCommand(
                "both sides need at least one combatant".into(),
            ));
        }

        let mut all = party;
        all.extend(monsters);
        for combatant in all.iter_mut() {
            let roll = self.dice.d20(Advantage::Normal);
            combatant.initiative =
                roll.natural as i32 + combatant.stats.modifier(Ability::Dexterity);
        }

        if let Some(grid) = &grid {
            let mut player_cells = grid.player_start_zone.iter();
            let mut enemy_cells = grid.enemy_start_zone.iter();
            for combatant in all.iter_mut() {
                let cell = if combatant.kind.is_hostile() {
                    enemy_cells.next()
                } else {
                    player_cells.next()
                };
                if let Some(cell) = cell {
                    combatant.position = *cell;
                }
            }
        }

        let mut state = CombatState::new(all, grid);
        state.push_event(CombatEventKind::EncounterStarted, "battle joined");
        state.push_log("Battle is joined!");
        tracing::info!(combatants = state.combatants.len(), "encounter started");
        self.state = Some(state);
        self.awaiting_player = false;
        Ok(())
    }

    /// Run one turn of the state machine
    ///
    /// Rejects re-entrant calls: a second invocation while a turn is in
    /// flight does nothing and returns `Ignored`.
    pub async fn process_turn(&mut self) -> Result<TurnOutcome> {
        if self.turn_in_flight {
            tracing::warn!("process_turn called while a turn is in flight, ignoring");
            return Ok(TurnOutcome::Ignored);
        }
        if self.state.is_none() {
            return Err(EngineError::NoActiveEncounter);
        }

        self.turn_in_flight = true;
        let outcome = self.run_turn().await;
        self.turn_in_flight = false;
        outcome
    }

    async fn run_turn(&mut self) -> Result<TurnOutcome> {
        // Still parked on a player's turn: nothing to re-run
        if self.awaiting_player {
            return Ok(TurnOutcome::AwaitingPlayer);
        }

        let (actor_id, is_player) = self.turn_start()?;

        // Start-of-turn hazards can down the actor outright
        if let Some(outcome) = self.check_end() {
            return Ok(TurnOutcome::CombatEnded(outcome));
        }
        let actor_downed = self
            .state
            .as_ref()
            .and_then(|s| s.combatant(actor_id))
            .is_none_or(|c| !c.is_alive());
        if actor_downed {
            if let Some(outcome) = self.finish_turn() {
                return Ok(TurnOutcome::CombatEnded(outcome));
            }
            return Ok(TurnOutcome::TurnComplete);
        }

        if is_player {
            self.awaiting_player = true;
            return Ok(TurnOutcome::AwaitingPlayer);
        }

        // Presentation pacing around the AI's visible actions
        self.pace(self.config.ai_think_delay_ms).await;

        for _attempt in 0..self.config.max_ai_actions_per_turn {
            let intent = {
                let state = self.state.as_ref().ok_or(EngineError::NoActiveEncounter)?;
                match state.combatant(actor_id) {
                    Some(actor) if actor.is_alive() => ai::decide_action(actor, state),
                    _ => break,
                }
            };

            match intent {
                ActionIntent::Attack { target } => {
                    let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
                    match attempt_attack(state, &mut self.dice, actor_id, target) {
                        Ok(AttackAttempt::Resolved(_)) => {
                            if let Some(outcome) = self.check_end() {
                                self.pace(self.config.ai_recovery_delay_ms).await;
                                return Ok(TurnOutcome::CombatEnded(outcome));
                            }
                        }
                        Ok(AttackAttempt::Blocked(reason)) => {
                            tracing::debug!(%reason, "ai attack blocked");
                            break;
                        }
                        // Action-processing failures never freeze the
                        // turn loop; log and move on
                        Err(error) => {
                            tracing::error!(%error, "error while resolving ai action");
                            if let Some(state) = self.state.as_mut() {
                                state.push_log(format!("[system] action failed: {error}"));
                            }
                            break;
                        }
                    }
                }
                ActionIntent::MoveToward { target } => {
                    let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
                    let moved = advance_toward(state, &mut self.dice, actor_id, target);
                    if let Some(outcome) = self.check_end() {
                        // An opportunity attack on the mover ended it
                        self.pace(self.config.ai_recovery_delay_ms).await;
                        return Ok(TurnOutcome::CombatEnded(outcome));
                    }
                    if moved == 0 {
                        break;
                    }
                }
                ActionIntent::Retreat { from } => {
                    let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
                    retreat_from(state, &mut self.dice, actor_id, from);
                    if let Some(outcome) = self.check_end() {
                        self.pace(self.config.ai_recovery_delay_ms).await;
                        return Ok(TurnOutcome::CombatEnded(outcome));
                    }
                    break;
                }
                ActionIntent::Hold => break,
            }
        }

        self.pace(self.config.ai_recovery_delay_ms).await;

        if let Some(outcome) = self.finish_turn() {
            return Ok(TurnOutcome::CombatEnded(outcome));
        }
        Ok(TurnOutcome::TurnComplete)
    }

    /// Handle a command for the current player actor
    ///
    /// Refusals never mutate state; the reason is user-facing.
    pub fn handle_command(&mut self, command: PlayerCommand) -> Result<CommandOutcome> {
        if self.turn_in_flight {
            return Ok(CommandOutcome::Rejected {
                reason: "Another turn is still resolving".into(),
            });
        }
        let state = self.state.as_ref().ok_or(EngineError::NoActiveEncounter)?;
        let Some(actor) = state.current() else {
            return Err(EngineError::NoActiveEncounter);
        };
        if !actor.kind.awaits_external_command() || !self.awaiting_player {
            return Ok(CommandOutcome::Rejected {
                reason: "It isn't your turn".into(),
            });
        }
        let actor_id = actor.id;

        match command {
            PlayerCommand::Target { id } => self.command_target(id),
            PlayerCommand::Attack => self.command_attack(actor_id),
            PlayerCommand::Dodge => {
                self.command_status_action(actor_id, StatusEffectKind::Dodging, "takes the Dodge action")
            }
            PlayerCommand::Disengage => self.command_status_action(
                actor_id,
                StatusEffectKind::Disengaging,
                "disengages carefully",
            ),
            PlayerCommand::Hide => self.command_hide(actor_id),
            PlayerCommand::UseItem { item } => self.command_use_item(actor_id, &item),
            PlayerCommand::Move { x, y, mode } => self.command_move(actor_id, x, y, mode),
            PlayerCommand::EndTurn => {
                self.awaiting_player = false;
                if let Some(outcome) = self.finish_turn() {
                    return Ok(CommandOutcome::CombatEnded(outcome));
                }
                Ok(CommandOutcome::TurnEnded)
            }
        }
    }

    fn command_target(&mut self, id: CombatantId) -> Result<CommandOutcome> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
        match state.combatant(id) {
            Some(target) if target.is_alive() && target.kind.is_hostile() => {
                let name = target.name.clone();
                state.selected_target_id = Some(id);
                state.push_log(format!("Target: {name}"));
                Ok(CommandOutcome::Resolved { result: None })
            }
            Some(target) if !target.is_alive() => Ok(CommandOutcome::Rejected {
                reason: format!("{} is already down", target.name),
            }),
            Some(_) => Ok(CommandOutcome::Rejected {
                reason: "You can only target hostiles".into(),
            }),
            None => Ok(CommandOutcome::Rejected {
                reason: "No such target".into(),
            }),
        }
    }

    fn command_attack(&mut self, actor_id: CombatantId) -> Result<CommandOutcome> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
        let Some(target_id) = state.selected_target_id else {
            return Ok(CommandOutcome::Rejected {
                reason: "No target selected".into(),
            });
        };
        match attempt_attack(state, &mut self.dice, actor_id, target_id)? {
            AttackAttempt::Blocked(reason) => Ok(CommandOutcome::Rejected { reason }),
            AttackAttempt::Resolved(result) => {
                if let Some(outcome) = self.check_end() {
                    self.awaiting_player = false;
                    return Ok(CommandOutcome::CombatEnded(outcome));
                }
                Ok(CommandOutcome::Resolved {
                    result: Some(result),
                })
            }
        }
    }

    fn command_status_action(
        &mut self,
        actor_id: CombatantId,
        kind: StatusEffectKind,
        log_verb: &str,
    ) -> Result<CommandOutcome> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
        let Some(actor) = state.combatant_mut(actor_id) else {
            return Err(EngineError::CombatantNotFound(actor_id));
        };
        if actor.action_spent {
            return Ok(CommandOutcome::Rejected {
                reason: "You've already used your action".into(),
            });
        }
        actor.action_spent = true;
        actor.add_status(StatusEffect::new(kind, Some(1)));
        let name = actor.name.clone();
        let line = format!("{name} {log_verb}");
        state.push_log(line.clone());
        state.turn_actions.push(line);
        Ok(CommandOutcome::Resolved { result: None })
    }

    fn command_hide(&mut self, actor_id: CombatantId) -> Result<CommandOutcome> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
        let Some(actor) = state.combatant(actor_id) else {
            return Err(EngineError::CombatantNotFound(actor_id));
        };
        if actor.action_spent {
            return Ok(CommandOutcome::Rejected {
                reason: "You've already used your action".into(),
            });
        }

        // Stealth against the sharpest opposing watcher
        let watcher_dc = state
            .combatants
            .iter()
            .filter(|c| c.is_alive() && c.kind.is_hostile())
            .map(passive_perception)
            .max()
            .unwrap_or(10);
        let check = resolve_check(
            &mut self.dice,
            actor,
            Ability::Dexterity,
            Some(Skill::Stealth),
            Some(watcher_dc),
            Advantage::Normal,
        );
        let name = actor.name.clone();
        let succeeded = check.success.unwrap_or(false);

        let actor = state
            .combatant_mut(actor_id)
            .ok_or(EngineError::CombatantNotFound(actor_id))?;
        actor.action_spent = true;
        let line = if succeeded {
            actor.add_status(StatusEffect::new(StatusEffectKind::Hidden, None));
            format!("{name} slips out of sight ({} vs DC {watcher_dc})", check.total)
        } else {
            format!("{name} fails to find cover ({} vs DC {watcher_dc})", check.total)
        };
        state.push_log(line.clone());
        state.turn_actions.push(line);
        Ok(CommandOutcome::Resolved { result: None })
    }

    fn command_use_item(&mut self, actor_id: CombatantId, item: &str) -> Result<CommandOutcome> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
        match item.to_lowercase().as_str() {
            "potion" | "healing potion" | "potion of healing" => {
                let Some(actor) = state.combatant(actor_id) else {
                    return Err(EngineError::CombatantNotFound(actor_id));
                };
                if actor.action_spent {
                    return Ok(CommandOutcome::Rejected {
                        reason: "You've already used your action".into(),
                    });
                }
                let healing = self.dice.roll(&DiceFormula::new(2, 4, 2)).total;
                let actor = state
                    .combatant_mut(actor_id)
                    .ok_or(EngineError::CombatantNotFound(actor_id))?;
                actor.action_spent = true;
                apply_healing(actor, healing);
                let line = format!("{} drinks a healing potion ({healing} hp)", actor.name);
                state.push_log(line.clone());
                state.turn_actions.push(line);
                Ok(CommandOutcome::Resolved { result: None })
            }
            _ => Ok(CommandOutcome::Rejected {
                reason: format!("You don't have a {item}"),
            }),
        }
    }

    fn command_move(
        &mut self,
        actor_id: CombatantId,
        x: i32,
        y: i32,
        mode: MoveMode,
    ) -> Result<CommandOutcome> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
        let destination = GridPosition::new(x, y);

        let Some(grid) = state.grid.as_ref() else {
            return Ok(CommandOutcome::Rejected {
                reason: "There is no battlefield to move on".into(),
            });
        };
        let occupied = state.occupied_positions(Some(actor_id));
        if !grid.is_walkable(destination, &occupied) {
            return Ok(CommandOutcome::Rejected {
                reason: format!("You can't stand at {destination}"),
            });
        }

        let Some(actor) = state.combatant(actor_id) else {
            return Err(EngineError::CombatantNotFound(actor_id));
        };
        let start = actor.position;
        let Some(path) = find_path(grid, start, destination, &occupied) else {
            return Ok(CommandOutcome::Rejected {
                reason: format!("No path to {destination}"),
            });
        };

        let cost = (path.len() - 1) as u32;
        let mut budget = actor.movement_remaining;
        if mode == MoveMode::Dash {
            if actor.action_spent {
                return Ok(CommandOutcome::Rejected {
                    reason: "You've already used your action".into(),
                });
            }
            budget += actor.movement_speed;
        }
        if cost > budget {
            return Ok(CommandOutcome::Rejected {
                reason: format!("{destination} is too far ({cost} cells)"),
            });
        }

        // Commit: dash spends the action, leaving reach provokes
        if mode == MoveMode::Dash {
            let actor = state
                .combatant_mut(actor_id)
                .ok_or(EngineError::CombatantNotFound(actor_id))?;
            actor.action_spent = true;
            actor.movement_remaining += actor.movement_speed;
        }
        provoke_opportunity_attacks(state, &mut self.dice, actor_id);

        let still_up = state.combatant(actor_id).is_some_and(|c| c.is_alive());
        if still_up {
            let actor = state
                .combatant_mut(actor_id)
                .ok_or(EngineError::CombatantNotFound(actor_id))?;
            actor.position = destination;
            actor.movement_remaining -= cost;
            let name = actor.name.clone();
            let line = format!("{name} moves to {destination}");
            state.push_log(line.clone());
            state.turn_actions.push(line);
        }

        if let Some(outcome) = self.check_end() {
            self.awaiting_player = false;
            return Ok(CommandOutcome::CombatEnded(outcome));
        }
        Ok(CommandOutcome::Resolved { result: None })
    }

    /// TurnStart: skip to a living actor, reset economy, tick statuses,
    /// apply start-of-turn hazards, broadcast the banner
    fn turn_start(&mut self) -> Result<(CombatantId, bool)> {
        let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
        if state.current().is_none_or(|c| !c.is_alive()) {
            state.advance_turn();
        }
        let (actor_id, actor_name, is_player) = {
            let actor = state.current().ok_or(EngineError::NoActiveEncounter)?;
            (
                actor.id,
                actor.name.clone(),
                actor.kind.awaits_external_command(),
            )
        };

        state.turn_actions.clear();
        state.active_banner = Some(ActiveBanner {
            combatant: actor_id,
            name: actor_name.clone(),
            is_player,
        });
        state.push_event(
            CombatEventKind::TurnStarted { combatant: actor_id },
            format!("{actor_name} begins their turn"),
        );
        tracing::debug!(actor = %actor_name, round = state.round, "turn start");

        let expired = {
            let actor = state
                .current_mut()
                .ok_or(EngineError::NoActiveEncounter)?;
            actor.start_turn_reset();
            actor.tick_status_effects()
        };
        for kind in expired {
            state.push_event(
                CombatEventKind::StatusExpired { combatant: actor_id },
                format!("{actor_name} is no longer {}", kind.label()),
            );
            state.push_log(format!("{actor_name} is no longer {}", kind.label()));
        }

        // Hazardous ground burns whoever starts their turn on it
        let hazard = state.grid.as_ref().and_then(|grid| {
            let pos = state.combatant(actor_id)?.position;
            grid.feature_at(pos)?.hazard.clone()
        });
        if let Some(hazard) = hazard {
            let damage = self.dice.roll(&hazard.damage).total.max(1);
            let state = self.state.as_mut().ok_or(EngineError::NoActiveEncounter)?;
            state.push_log(format!(
                "{actor_name} takes {damage} damage from {}",
                hazard.description
            ));
            damage_with_concentration(state, &mut self.dice, actor_id, damage);
        }

        Ok((actor_id, is_player))
    }

    /// TurnEnd: advance to the next living actor and autosave
    ///
    /// Returns the outcome when the encounter is over instead.
    fn finish_turn(&mut self) -> Option<EncounterOutcome> {
        if let Some(outcome) = self.check_end() {
            return Some(outcome);
        }
        if let Some(state) = self.state.as_mut() {
            state.advance_turn();
        }
        self.autosave();
        None
    }

    /// Enter CombatEnd the moment a side has no living members
    fn check_end(&mut self) -> Option<EncounterOutcome> {
        let victory = self.state.as_ref()?.side_defeated()?;

        let state = self.state.as_mut()?;
        let line = if victory {
            "The last foe falls. Victory!"
        } else {
            "The party has fallen."
        };
        state.push_log(line);
        state.push_event(CombatEventKind::EncounterEnded { victory }, line);
        let outcome = build_outcome(state, &mut self.dice, &self.config, victory);
        tracing::info!(victory, rounds = outcome.rounds, xp = outcome.xp_awarded, "encounter ended");

        self.state = None;
        self.awaiting_player = false;
        Some(outcome)
    }

    fn autosave(&mut self) {
        if !self.config.autosave {
            return;
        }
        let (Some(store), Some(state)) = (&self.store, &self.state) else {
            return;
        };
        // Save failures are non-fatal; the caller's retry policy decides
        if let Err(error) = store.save(state) {
            tracing::warn!(%error, "failed to save combat state");
        }
    }

    async fn pace(&self, delay_ms: u64) {
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

/// Outcome of one attack attempt
enum AttackAttempt {
    Resolved(crate::engine::resolution::ActionResult),
    Blocked(String),
}

/// Resolve one weapon attack, mirroring the player modifier assembly
/// for monsters: ability modifier + proficiency, cover raising the
/// effective AC, point-blank ranged shots at disadvantage
fn attempt_attack(
    state: &mut CombatState,
    dice: &mut DiceRoller,
    attacker_id: CombatantId,
    target_id: CombatantId,
) -> Result<AttackAttempt> {
    let attacker = state
        .combatant(attacker_id)
        .ok_or(EngineError::CombatantNotFound(attacker_id))?;
    let target = state
        .combatant(target_id)
        .ok_or(EngineError::CombatantNotFound(target_id))?;

    if !target.is_alive() {
        return Ok(AttackAttempt::Blocked(format!(
            "{} is already down",
            target.name
        )));
    }
    if attacker.action_spent {
        return Ok(AttackAttempt::Blocked("No action left this turn".into()));
    }

    let attack = attacker
        .attacks
        .first()
        .cloned()
        .unwrap_or_else(AttackProfile::unarmed);
    let distance = attacker.position.distance(&target.position);
    if distance > attacker.attack_range(&attack) {
        return Ok(AttackAttempt::Blocked(format!(
            "{} is out of range",
            target.name
        )));
    }

    let mut force_disadvantage = false;
    let mut cover_bonus = 0;
    if let Some(grid) = &state.grid {
        if !grid.has_line_of_sight(attacker.position, target.position) {
            return Ok(AttackAttempt::Blocked(format!(
                "No line of sight to {}",
                target.name
            )));
        }
        let cover = grid.cover_between(attacker.position, target.position);
        if cover.blocks_targeting() {
            return Ok(AttackAttempt::Blocked(format!(
                "{} is behind full cover",
                target.name
            )));
        }
        cover_bonus = cover.ac_bonus();
    }
    if attack.is_ranged && distance <= 1 {
        force_disadvantage = true;
    }

    let stat_modifier = attacker.stats.modifier(attack.ability);
    let attack_bonus = stat_modifier + proficiency_bonus(attacker.level);
    // Cover raises the effective AC; folding it into the bonus keeps
    // the resolution contract untouched
    let result = resolve_attack(
        dice,
        attacker,
        target,
        attack_bonus - cover_bonus,
        &attack.damage,
        stat_modifier,
        force_disadvantage,
    );

    let attacker_name = attacker.name.clone();
    let target_name = target.name.clone();

    state.last_roll = Some(result.details);
    {
        let attacker = state
            .combatant_mut(attacker_id)
            .ok_or(EngineError::CombatantNotFound(attacker_id))?;
        attacker.action_spent = true;
        // Striking from hiding reveals you
        attacker.remove_status(StatusEffectKind::Hidden);
    }

    let line = formatter::render(dice, &result, &attacker_name, &target_name);
    state.push_log(line.clone());
    state.turn_actions.push(line);
    state.push_event(
        CombatEventKind::ActionResolved {
            combatant: attacker_id,
        },
        result.message.clone(),
    );

    if result.damage > 0 {
        damage_with_concentration(state, dice, target_id, result.damage);
    }

    Ok(AttackAttempt::Resolved(result))
}

/// Apply damage, then handle downing and concentration fallout
///
/// A concentrating combatant that takes damage rolls a CON save against
/// `max(10, damage / 2)`; failure clears concentration and despawns any
/// summons it sustains.
fn damage_with_concentration(
    state: &mut CombatState,
    dice: &mut DiceRoller,
    target_id: CombatantId,
    amount: i32,
) {
    let Some(target) = state.combatant_mut(target_id) else {
        return;
    };
    apply_damage(target, amount);
    let name = target.name.clone();
    let downed = !target.is_alive();
    let concentrating = target.concentration.is_some();

    if downed {
        state.push_event(
            CombatEventKind::CombatantDowned {
                combatant: target_id,
            },
            format!("{name} falls"),
        );
        state.push_log(format!("{name} falls!"));
    }

    if concentrating {
        let dc = 10.max(amount / 2);
        let save = match state.combatant(target_id) {
            Some(target) => resolve_save(dice, target, Ability::Constitution, dc, Advantage::Normal),
            None => return,
        };
        let broken = downed || !save.success.unwrap_or(false);
        if broken {
            let spell_name = state
                .combatant_mut(target_id)
                .and_then(|target| target.concentration.take())
                .map(|c| c.spell_name)
                .unwrap_or_default();
            state.push_event(
                CombatEventKind::ConcentrationBroken {
                    combatant: target_id,
                },
                format!("{name} loses concentration on {spell_name}"),
            );
            state.push_log(format!("{name} loses concentration on {spell_name}"));
            despawn_summons_of(state, target_id);
        }
    }
}

/// Remove every summon sustained by the given caster
fn despawn_summons_of(state: &mut CombatState, caster_id: CombatantId) {
    let summon_ids: Vec<CombatantId> = state
        .combatants
        .iter()
        .filter(|c| {
            matches!(c.kind, crate::engine::combatant::CombatantKind::Summon)
                && c.source_id == Some(caster_id)
        })
        .map(|c| c.id)
        .collect();
    for id in summon_ids {
        let name = state
            .combatant(id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        state.push_event(
            CombatEventKind::SummonDespawned { combatant: id },
            format!("{name} vanishes"),
        );
        state.push_log(format!("{name} vanishes"));
        state.remove_combatant(id);
    }
    // Removal preserves relative order; re-sorting keeps the invariant
    // explicit after the roster change
    state.sort_turn_order();
}

/// Melee threats adjacent to a mover get one reaction strike unless the
/// mover is disengaging
fn provoke_opportunity_attacks(
    state: &mut CombatState,
    dice: &mut DiceRoller,
    mover_id: CombatantId,
) {
    let Some(mover) = state.combatant(mover_id) else {
        return;
    };
    if mover.has_status(StatusEffectKind::Disengaging) {
        return;
    }
    let mover_pos = mover.position;
    let mover_hostile = mover.kind.is_hostile();

    let threats: Vec<CombatantId> = state
        .combatants
        .iter()
        .filter(|c| {
            c.is_alive()
                && c.kind.is_hostile() != mover_hostile
                && !c.reaction_spent
                && !c.tactical.is_ranged
                && c.position.distance(&mover_pos) <= c.tactical.reach
        })
        .map(|c| c.id)
        .collect();

    for threat_id in threats {
        if !state.combatant(mover_id).is_some_and(|c| c.is_alive()) {
            break;
        }
        let result = {
            let (Some(threat), Some(mover)) =
                (state.combatant(threat_id), state.combatant(mover_id))
            else {
                continue;
            };
            let attack = threat
                .attacks
                .first()
                .cloned()
                .unwrap_or_else(AttackProfile::unarmed);
            let stat_modifier = threat.stats.modifier(attack.ability);
            resolve_attack(
                dice,
                threat,
                mover,
                stat_modifier + proficiency_bonus(threat.level),
                &attack.damage,
                stat_modifier,
                false,
            )
        };
        let threat_name = state
            .combatant(threat_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();

        if let Some(threat) = state.combatant_mut(threat_id) {
            threat.reaction_spent = true;
        }
        state.last_roll = Some(result.details);
        let mover_name = state
            .combatant(mover_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        state.push_log(format!(
            "{threat_name} lashes out as {mover_name} moves away"
        ));
        let line = formatter::render(dice, &result, &threat_name, &mover_name);
        state.push_log(line);
        if result.damage > 0 {
            damage_with_concentration(state, dice, mover_id, result.damage);
        }
    }
}

/// Move the actor along the shortest path toward a target, stopping one
/// cell short and spending movement per cell; returns cells moved
fn advance_toward(
    state: &mut CombatState,
    dice: &mut DiceRoller,
    actor_id: CombatantId,
    target_id: CombatantId,
) -> u32 {
    let Some(actor) = state.combatant(actor_id) else {
        return 0;
    };
    let Some(target) = state.combatant(target_id) else {
        return 0;
    };
    let (start, budget) = (actor.position, actor.movement_remaining);
    let goal = target.position;

    let Some(grid) = state.grid.as_ref() else {
        return 0;
    };
    let occupied = state.occupied_positions(Some(actor_id));
    let Some(path) = find_path(grid, start, goal, &occupied) else {
        return 0;
    };
    if path.len() < 2 {
        return 0;
    }

    // The goal cell is the target itself; stop on the cell before it
    let last_usable = (path.len() - 2) as u32;
    let steps = last_usable.min(budget);
    if steps == 0 {
        return 0;
    }
    let destination = path[steps as usize];

    provoke_opportunity_attacks(state, dice, actor_id);
    let Some(actor) = state.combatant_mut(actor_id) else {
        return 0;
    };
    if !actor.is_alive() {
        return 0;
    }
    actor.position = destination;
    actor.movement_remaining -= steps;
    let name = actor.name.clone();
    let line = format!("{name} closes in ({steps} cells)");
    state.push_log(line.clone());
    state.turn_actions.push(line);
    steps
}

/// Greedy withdrawal: keep stepping to the neighbor cell farthest from
/// the threat while movement remains
fn retreat_from(
    state: &mut CombatState,
    dice: &mut DiceRoller,
    actor_id: CombatantId,
    threat_id: CombatantId,
) {
    let Some(threat) = state.combatant(threat_id) else {
        return;
    };
    let threat_pos = threat.position;
    if state.grid.is_none() {
        return;
    }

    provoke_opportunity_attacks(state, dice, actor_id);

    let mut moved = 0u32;
    loop {
        let Some(actor) = state.combatant(actor_id) else {
            break;
        };
        if !actor.is_alive() || actor.movement_remaining == 0 {
            break;
        }
        let here = actor.position;
        let occupied = state.occupied_positions(Some(actor_id));
        let Some(grid) = state.grid.as_ref() else {
            break;
        };

        let best = here
            .neighbors()
            .into_iter()
            .filter(|cell| grid.is_walkable(*cell, &occupied))
            .max_by_key(|cell| cell.distance(&threat_pos));
        let Some(best) = best else {
            break;
        };
        if best.distance(&threat_pos) <= here.distance(&threat_pos) {
            break;
        }

        let Some(actor) = state.combatant_mut(actor_id) else {
            break;
        };
        actor.position = best;
        actor.movement_remaining -= 1;
        moved += 1;
    }

    if moved > 0 {
        let name = state
            .combatant(actor_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let line = format!("{name} falls back ({moved} cells)");
        state.push_log(line.clone());
        state.turn_actions.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{spawn_monster, StaticData};
    use crate::engine::combatant::{CombatantKind, Concentration};
    use crate::grid::generator::{self, Biome};
    use crate::mechanics::AbilityScores;
    use crate::persist::JsonFileStore;

    fn player(name: &str, hp: i32) -> Combatant {
        let mut c = Combatant::new(
            name,
            CombatantKind::Player,
            hp,
            16,
            AbilityScores::new(16, 12, 14, 10, 10, 10),
        )
        .unwrap();
        c.level = 3;
        c
    }

    fn companion(name: &str, hp: i32) -> Combatant {
        let mut c = player(name, hp);
        c.kind = CombatantKind::Companion;
        c
    }

    fn orchestrator(seed: u64) -> Orchestrator {
        Orchestrator::new(EncounterConfig::headless(), DiceRoller::seeded(seed))
    }

    #[test]
    fn test_start_encounter_deploys_and_sorts() {
        let mut orch = orchestrator(1);
        let grid = generator::generate(Biome::Grassland, "deploy");
        orch.start_encounter(
            vec![player("Hero", 20), companion("Scout", 15)],
            vec![spawn_monster(&StaticData, "goblin")],
            Some(grid),
        )
        .unwrap();

        let state = orch.state().unwrap();
        assert_eq!(state.combatants.len(), 3);
        for pair in state.combatants.windows(2) {
            assert!(pair[0].initiative >= pair[1].initiative);
        }
        for c in &state.combatants {
            let zone = if c.kind.is_hostile() {
                &state.grid.as_ref().unwrap().enemy_start_zone
            } else {
                &state.grid.as_ref().unwrap().player_start_zone
            };
            assert!(zone.contains(&c.position));
        }
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut orch = orchestrator(1);
        orch.start_encounter(
            vec![player("Hero", 20)],
            vec![spawn_monster(&StaticData, "goblin")],
            None,
        )
        .unwrap();
        let again = orch.start_encounter(
            vec![player("Hero", 20)],
            vec![spawn_monster(&StaticData, "goblin")],
            None,
        );
        assert!(again.is_err());
    }

    #[test]
    fn test_empty_side_rejected() {
        let mut orch = orchestrator(1);
        assert!(orch
            .start_encounter(vec![player("Hero", 20)], vec![], None)
            .is_err());
    }

    #[tokio::test]
    async fn test_reentrancy_guard_ignores_second_call() {
        let mut orch = orchestrator(1);
        orch.start_encounter(
            vec![companion("Scout", 15)],
            vec![spawn_monster(&StaticData, "goblin")],
            None,
        )
        .unwrap();
        orch.turn_in_flight = true;
        assert!(matches!(
            orch.process_turn().await.unwrap(),
            TurnOutcome::Ignored
        ));
        orch.turn_in_flight = false;
    }

    #[tokio::test]
    async fn test_process_turn_without_encounter_errors() {
        let mut orch = orchestrator(1);
        assert!(orch.process_turn().await.is_err());
    }

    #[tokio::test]
    async fn test_ai_only_combat_runs_to_completion() {
        let mut orch = orchestrator(99);
        let grid = generator::generate(Biome::Grassland, "ai-only");
        orch.start_encounter(
            vec![companion("Bran", 30), companion("Wren", 25)],
            vec![
                spawn_monster(&StaticData, "goblin"),
                spawn_monster(&StaticData, "wolf"),
            ],
            Some(grid),
        )
        .unwrap();

        let mut ended = None;
        for _ in 0..300 {
            match orch.process_turn().await.unwrap() {
                TurnOutcome::CombatEnded(outcome) => {
                    ended = Some(outcome);
                    break;
                }
                TurnOutcome::AwaitingPlayer => panic!("no players in this fight"),
                _ => {}
            }
        }
        let outcome = ended.expect("combat should resolve");
        assert!(orch.state().is_none());
        assert_eq!(outcome.elapsed_seconds, outcome.rounds * 6);
        if outcome.victory {
            assert!(outcome.xp_awarded > 0);
            assert_eq!(outcome.loot.len(), 2);
            assert!(!outcome.survivors.is_empty());
        }
    }

    #[tokio::test]
    async fn test_player_turn_waits_then_resolves_commands() {
        let mut orch = orchestrator(7);
        let mut goblin = spawn_monster(&StaticData, "goblin");
        goblin.hp.current = 1;
        goblin.hp.max = 1;
        goblin.ac = 1;
        let goblin_id = goblin.id;
        orch.start_encounter(vec![player("Hero", 100)], vec![goblin], None)
            .unwrap();

        let mut ended = None;
        for _ in 0..50 {
            match orch.process_turn().await.unwrap() {
                TurnOutcome::AwaitingPlayer => {
                    match orch
                        .handle_command(PlayerCommand::Target { id: goblin_id })
                        .unwrap()
                    {
                        CommandOutcome::Resolved { .. } => {}
                        other => panic!("target rejected: {other:?}"),
                    }
                    // AC 1 and +5 to hit: this always lands and kills
                    match orch.handle_command(PlayerCommand::Attack).unwrap() {
                        CommandOutcome::CombatEnded(outcome) => {
                            ended = Some(outcome);
                            break;
                        }
                        other => panic!("attack should end combat, got {other:?}"),
                    }
                }
                TurnOutcome::CombatEnded(outcome) => {
                    ended = Some(outcome);
                    break;
                }
                _ => {}
            }
        }
        let outcome = ended.expect("combat should resolve");
        assert!(outcome.victory);
    }

    #[tokio::test]
    async fn test_commands_rejected_when_not_awaiting() {
        let mut orch = orchestrator(7);
        orch.start_encounter(
            vec![player("Hero", 20)],
            vec![spawn_monster(&StaticData, "goblin")],
            None,
        )
        .unwrap();
        // No process_turn yet, so nobody is awaiting commands
        match orch.handle_command(PlayerCommand::Dodge).unwrap() {
            CommandOutcome::Rejected { reason } => assert!(reason.contains("turn")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_item_rejected_without_mutation() {
        let mut orch = orchestrator(3);
        orch.start_encounter(
            vec![player("Hero", 20)],
            vec![spawn_monster(&StaticData, "goblin")],
            None,
        )
        .unwrap();
        for _ in 0..10 {
            if matches!(
                orch.process_turn().await.unwrap(),
                TurnOutcome::AwaitingPlayer
            ) {
                break;
            }
        }
        let logs_before = orch.state().unwrap().logs.len();
        match orch
            .handle_command(PlayerCommand::UseItem {
                item: "vorpal sword".into(),
            })
            .unwrap()
        {
            CommandOutcome::Rejected { reason } => {
                assert!(reason.contains("vorpal sword"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(orch.state().unwrap().logs.len(), logs_before);
        assert!(!orch.state().unwrap().current().unwrap().action_spent);
    }

    #[test]
    fn test_concentration_break_despawns_summons() {
        // 10 damage -> DC max(10, 5) = 10; a failed CON save clears
        // concentration and removes the caster's summons.
        let mut caster = player("Caster", 30);
        caster.stats.constitution = 1; // -5 to the save
        let caster_id = caster.id;
        caster.concentration = Some(Concentration {
            spell_name: "Summon Wolf".into(),
            start_round: 1,
        });
        let mut wolf = Combatant::new(
            "Spirit Wolf",
            CombatantKind::Summon,
            11,
            13,
            AbilityScores::flat(),
        )
        .unwrap();
        wolf.source_id = Some(caster_id);
        let wolf_id = wolf.id;
        let orc = spawn_monster(&StaticData, "orc");

        let mut state = CombatState::new(vec![caster, wolf, orc], None);

        // Find a seed whose first d20 cannot save: natural - 5 < 10
        let seed = (0..10_000u64)
            .find(|s| DiceRoller::seeded(*s).d20(Advantage::Normal).natural < 15)
            .unwrap();
        let mut dice = DiceRoller::seeded(seed);
        damage_with_concentration(&mut state, &mut dice, caster_id, 10);

        let caster = state.combatant(caster_id).unwrap();
        assert!(caster.concentration.is_none());
        assert!(state.combatant(wolf_id).is_none());
        assert_eq!(state.combatants.len(), 2);
    }

    #[test]
    fn test_concentration_holds_on_success() {
        let mut caster = player("Caster", 30);
        caster.stats.constitution = 30; // +10: always saves vs DC 10
        let caster_id = caster.id;
        caster.concentration = Some(Concentration {
            spell_name: "Bless".into(),
            start_round: 1,
        });
        let orc = spawn_monster(&StaticData, "orc");
        let mut state = CombatState::new(vec![caster, orc], None);

        let mut dice = DiceRoller::seeded(5);
        damage_with_concentration(&mut state, &mut dice, caster_id, 10);
        assert!(state.combatant(caster_id).unwrap().concentration.is_some());
    }

    #[tokio::test]
    async fn test_autosave_after_turn_boundary() {
        let dir = std::env::temp_dir().join("duskfall-autosave-test");
        let _ = std::fs::remove_dir_all(&dir);
        let config = EncounterConfig {
            autosave: true,
            ..EncounterConfig::headless()
        };
        let mut orch = Orchestrator::new(config, DiceRoller::seeded(11))
            .with_store(Box::new(JsonFileStore::new(&dir)));
        orch.start_encounter(
            vec![companion("Scout", 40)],
            vec![spawn_monster(&StaticData, "ogre")],
            None,
        )
        .unwrap();

        orch.process_turn().await.unwrap();
        let restored = JsonFileStore::new(&dir).load("encounter").unwrap();
        assert!(restored.is_some());
        assert_eq!(restored.unwrap().combatants.len(), 2);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_downed_enemy_skipped_in_turn_order() {
        let mut orch = orchestrator(21);
        let mut dead_goblin = spawn_monster(&StaticData, "goblin");
        dead_goblin.hp.current = 0;
        let dead_id = dead_goblin.id;
        orch.start_encounter(
            vec![companion("Scout", 40)],
            vec![dead_goblin, spawn_monster(&StaticData, "ogre")],
            None,
        )
        .unwrap();

        for _ in 0..12 {
            match orch.process_turn().await.unwrap() {
                TurnOutcome::CombatEnded(_) => break,
                _ => {
                    if let Some(state) = orch.state() {
                        assert_ne!(state.current().unwrap().id, dead_id);
                    }
                }
            }
        }
    }
}
