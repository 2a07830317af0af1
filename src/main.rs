//! Headless skirmish runner
//!
//! Runs a scripted party against a monster pack on a generated
//! battlefield and prints the outcome. Useful for watching the engine
//! work and for deterministic AI-vs-AI runs (fixed seed, zero delays).

use clap::Parser;

use duskfall::ai::{self, ActionIntent};
use duskfall::core::config::EncounterConfig;
use duskfall::core::error::Result;
use duskfall::data::{spawn_monster, StaticData};
use duskfall::dice::DiceRoller;
use duskfall::encounter::{
    CommandOutcome, MoveMode, Orchestrator, PlayerCommand, TurnOutcome,
};
use duskfall::engine::combatant::{Combatant, CombatantKind};
use duskfall::grid::generator::{self, Biome};
use duskfall::mechanics::{AbilityScores, Skill};
use duskfall::narrative::{self, NarratorClient};
use duskfall::persist::JsonFileStore;

#[derive(Parser, Debug)]
#[command(name = "duskfall")]
#[command(about = "Run a headless skirmish on a generated battlefield")]
struct Args {
    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Battlefield biome
    #[arg(long, default_value = "forest")]
    biome: String,

    /// Zero all presentation delays
    #[arg(long)]
    fast: bool,

    /// Directory for turn-boundary autosaves (omit to disable)
    #[arg(long)]
    save_dir: Option<String>,

    /// Monsters to spawn
    #[arg(long, default_values_t = vec!["goblin".to_string(), "goblin archer".to_string(), "orc".to_string()])]
    monsters: Vec<String>,
}

fn build_party() -> Result<Vec<Combatant>> {
    let mut aldric = Combatant::new(
        "Aldric",
        CombatantKind::Player,
        24,
        16,
        AbilityScores::new(16, 12, 14, 10, 11, 10),
    )?;
    aldric.level = 3;
    aldric.attacks[0].name = "Longsword".into();
    aldric.attacks[0].damage = "1d8".parse()?;
    aldric.skill_proficiencies.push(Skill::Athletics);

    let mut mira = Combatant::new(
        "Mira",
        CombatantKind::Companion,
        18,
        14,
        AbilityScores::new(10, 16, 12, 12, 14, 10),
    )?;
    mira.level = 3;
    mira.attacks[0].name = "Shortbow".into();
    mira.attacks[0].damage = "1d6".parse()?;
    mira.attacks[0].ability = duskfall::mechanics::Ability::Dexterity;
    mira.attacks[0].is_ranged = true;
    mira.attacks[0].range = 16;
    mira.tactical.is_ranged = true;
    mira.tactical.range = 16;
    mira.skill_proficiencies.push(Skill::Stealth);

    Ok(vec![aldric, mira])
}

/// Drive the player actor with the same nearest-target logic the AI
/// uses, issued through the command surface
fn scripted_player_commands(orchestrator: &mut Orchestrator) -> Result<Option<CommandOutcome>> {
    let Some(state) = orchestrator.state() else {
        return Ok(None);
    };
    let Some(actor) = state.current() else {
        return Ok(None);
    };
    let intent = ai::decide_action(actor, state);
    let actor_pos = actor.position;
    let movement = actor.movement_remaining;

    match intent {
        ActionIntent::Attack { target } => {
            orchestrator.handle_command(PlayerCommand::Target { id: target })?;
            let outcome = orchestrator.handle_command(PlayerCommand::Attack)?;
            if let CommandOutcome::CombatEnded(_) = outcome {
                return Ok(Some(outcome));
            }
        }
        ActionIntent::MoveToward { target } => {
            let destination = orchestrator
                .state()
                .and_then(|s| s.combatant(target))
                .map(|t| t.position)
                .and_then(|goal| {
                    let state = orchestrator.state()?;
                    let grid = state.grid.as_ref()?;
                    let occupied = state.occupied_positions(state.current().map(|c| c.id));
                    let path =
                        duskfall::grid::pathfinding::find_path(grid, actor_pos, goal, &occupied)?;
                    let last_usable = path.len().saturating_sub(2);
                    let steps = (movement as usize).min(last_usable);
                    (steps > 0).then(|| path[steps])
                });
            if let Some(dest) = destination {
                let outcome = orchestrator.handle_command(PlayerCommand::Move {
                    x: dest.x,
                    y: dest.y,
                    mode: MoveMode::Normal,
                })?;
                if let CommandOutcome::CombatEnded(_) = outcome {
                    return Ok(Some(outcome));
                }
            }
        }
        _ => {}
    }

    let outcome = orchestrator.handle_command(PlayerCommand::EndTurn)?;
    if let CommandOutcome::CombatEnded(_) = outcome {
        return Ok(Some(outcome));
    }
    Ok(None)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "duskfall=info".into()),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);
    let biome: Biome = args.biome.parse()?;
    tracing::info!(seed, %biome, "starting skirmish");

    let config = if args.fast {
        EncounterConfig::headless()
    } else {
        EncounterConfig::default()
    };

    let grid = generator::generate(biome, &seed.to_string());
    let party = build_party()?;
    let monsters: Vec<Combatant> = args
        .monsters
        .iter()
        .map(|name| spawn_monster(&StaticData, name))
        .collect();

    let mut orchestrator = Orchestrator::new(config, DiceRoller::seeded(seed));
    if let Some(dir) = &args.save_dir {
        orchestrator = orchestrator.with_store(Box::new(JsonFileStore::new(dir)));
    }
    orchestrator.start_encounter(party, monsters, Some(grid))?;

    let narrator = NarratorClient::from_env().ok();
    if narrator.is_none() {
        tracing::info!("NARRATOR_API_KEY not set, summaries use the fallback text");
    }

    // Safety valve for pathological battlefields
    let max_turns = 500;
    let mut final_outcome = None;
    for _ in 0..max_turns {
        match orchestrator.process_turn().await? {
            TurnOutcome::AwaitingPlayer => {
                if let Some(CommandOutcome::CombatEnded(outcome)) =
                    scripted_player_commands(&mut orchestrator)?
                {
                    final_outcome = Some(outcome);
                    break;
                }
            }
            TurnOutcome::CombatEnded(outcome) => {
                final_outcome = Some(outcome);
                break;
            }
            TurnOutcome::TurnComplete | TurnOutcome::Ignored => {}
        }
    }

    match final_outcome {
        Some(outcome) => {
            println!();
            println!(
                "=== {} after {} rounds ===",
                if outcome.victory { "VICTORY" } else { "DEFEAT" },
                outcome.rounds
            );
            println!("XP awarded: {}", outcome.xp_awarded);
            for drop in &outcome.loot {
                match &drop.item {
                    Some(item) => println!("  {}: {} gold, {}", drop.source, drop.gold, item),
                    None => println!("  {}: {} gold", drop.source, drop.gold),
                }
            }
            for survivor in &outcome.survivors {
                println!(
                    "  {} stands at {}/{} hp",
                    survivor.name, survivor.hp.current, survivor.hp.max
                );
            }
            println!();
            println!("{}", narrative::summarize_or_fallback(narrator.as_ref(), &outcome).await);
        }
        None => println!("The skirmish did not resolve within {max_turns} turns."),
    }

    Ok(())
}
