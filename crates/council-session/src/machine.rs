use council_core::{
    rank, score, CouncilCatalog, CouncilEvent, GenerationSettings, PaletteMap, RubricWeights,
    ScoreRecord, TaskMessage,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use crate::render::RenderOp;

/// Shown in place of an agent card body when the model returned nothing
/// visible. Scored like any other output so the agent still ranks.
pub const EMPTY_OUTPUT_PLACEHOLDER: &str = "[no response from model]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
}

/// Why a task submission was rejected. Rejections mutate nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("a council session is already running")]
    TaskInFlight,
    #[error("not connected to the council server")]
    NotConnected,
    #[error("task text is empty")]
    EmptyTask,
}

/// An accepted submission: the message to put on the wire plus the render
/// instructions announcing the new session.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub message: TaskMessage,
    pub ops: Vec<RenderOp>,
}

/// The session lifecycle state machine. Owns every piece of per-session
/// state explicitly — callers hold a value, not a global — and performs no
/// I/O: events come in, render instructions come out, and the one outbound
/// message is returned from `submit_task` for the caller to transmit.
#[derive(Debug)]
pub struct SessionMachine {
    catalog: CouncilCatalog,
    selected: String,
    weights: RubricWeights,
    settings: GenerationSettings,
    model_overrides: HashMap<String, String>,
    phase: Phase,
    round: u32,
    started_at: Option<Instant>,
    last_elapsed: Option<Duration>,
    palette: PaletteMap,
    board: Vec<ScoreRecord>,
}

impl SessionMachine {
    pub fn new(catalog: CouncilCatalog) -> Self {
        let selected = catalog.initial_council().unwrap_or_default().to_string();
        Self {
            catalog,
            selected,
            weights: RubricWeights::default(),
            settings: GenerationSettings::default(),
            model_overrides: HashMap::new(),
            phase: Phase::Idle,
            round: 0,
            started_at: None,
            last_elapsed: None,
            palette: PaletteMap::new(),
            board: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn selected_council(&self) -> &str {
        &self.selected
    }

    pub fn catalog(&self) -> &CouncilCatalog {
        &self.catalog
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn weights(&self) -> RubricWeights {
        self.weights
    }

    pub fn records(&self) -> &[ScoreRecord] {
        &self.board
    }

    /// Elapsed time of the running session, or the final elapsed time of the
    /// last completed one.
    pub fn elapsed(&self) -> Option<Duration> {
        match self.started_at {
            Some(started) => Some(started.elapsed()),
            None => self.last_elapsed,
        }
    }

    /// Select a council by catalog key. An unknown key leaves the current
    /// selection unchanged.
    pub fn select_council(&mut self, key: &str) -> bool {
        if !self.catalog.contains(key) {
            debug!("council_select_rejected: unknown key {key}");
            return false;
        }
        self.selected = key.to_string();
        true
    }

    pub fn set_generation_settings(&mut self, settings: GenerationSettings) {
        self.settings = settings;
    }

    pub fn set_model_overrides(&mut self, overrides: HashMap<String, String>) {
        self.model_overrides = overrides;
    }

    /// Re-weight the leaderboard. Cached scores are untouched; only the
    /// ranking step re-runs.
    pub fn set_weights(&mut self, weights: RubricWeights) -> Option<RenderOp> {
        self.weights = weights;
        self.leaderboard()
    }

    /// Current ranking over the cached scores, if any agent has scored.
    pub fn leaderboard(&self) -> Option<RenderOp> {
        if self.board.is_empty() {
            return None;
        }
        Some(RenderOp::Leaderboard {
            entries: rank(&self.board, &self.weights),
        })
    }

    /// Submit a task. Valid only while idle, connected, and with non-blank
    /// text; anything else is rejected without touching session state. On
    /// acceptance all per-session state is reset and the machine runs until
    /// a terminal event.
    pub fn submit_task(&mut self, text: &str, connected: bool) -> Result<Submission, SubmitError> {
        if self.phase == Phase::Running {
            return Err(SubmitError::TaskInFlight);
        }
        if !connected {
            return Err(SubmitError::NotConnected);
        }
        let task = text.trim();
        if task.is_empty() {
            return Err(SubmitError::EmptyTask);
        }

        self.palette.reset();
        self.board.clear();
        self.round = 0;
        self.last_elapsed = None;
        self.started_at = Some(Instant::now());
        self.phase = Phase::Running;

        let mut message = TaskMessage::new(self.selected.clone(), task);
        if !self.settings.is_empty() {
            message.settings = Some(self.settings.clone());
        }
        if !self.model_overrides.is_empty() {
            message.model_overrides = Some(self.model_overrides.clone());
        }

        let info = self.catalog.get(&self.selected);
        let name = info
            .map(|preset| preset.name.clone())
            .unwrap_or_else(|| self.selected.clone());
        let strategy = info.map(|preset| preset.strategy).unwrap_or_default();
        info!("session_started: council={} strategy={strategy}", self.selected);

        Ok(Submission {
            message,
            ops: vec![RenderOp::SessionStarted {
                council: self.selected.clone(),
                name,
                strategy,
            }],
        })
    }

    /// Explicitly clear the transcript-derived state. No-op while running.
    pub fn clear_session(&mut self) -> bool {
        if self.phase == Phase::Running {
            return false;
        }
        self.palette.reset();
        self.board.clear();
        self.round = 0;
        self.last_elapsed = None;
        true
    }

    /// Advance on one inbound event, in transport order. Returns the render
    /// instructions the event produced, possibly none.
    pub fn handle_event(&mut self, event: CouncilEvent) -> Vec<RenderOp> {
        if self.phase == Phase::Idle {
            return self.handle_idle_event(event);
        }
        match event {
            CouncilEvent::Status { content } => vec![RenderOp::StatusLine { text: content }],
            CouncilEvent::RoundStart {
                round,
                total_rounds,
            } => {
                if round < self.round {
                    debug!("round_regressed: {round} after {}", self.round);
                }
                self.round = round;
                vec![RenderOp::RoundMarker {
                    round,
                    total_rounds,
                }]
            }
            CouncilEvent::AgentStart { agent, .. } => vec![RenderOp::StatusLine {
                text: format!("{agent} is responding..."),
            }],
            CouncilEvent::AgentDone {
                agent,
                round,
                content,
                model,
            } => {
                let content = if content.trim().is_empty() {
                    EMPTY_OUTPUT_PLACEHOLDER.to_string()
                } else {
                    content
                };
                let slot = self.palette.slot_for(&agent);
                self.record_score(&agent, &content);
                vec![RenderOp::AgentCard {
                    agent,
                    slot,
                    round,
                    content,
                    model,
                }]
            }
            CouncilEvent::RoundDone { round } => vec![RenderOp::StatusLine {
                text: format!("Round {round} complete"),
            }],
            CouncilEvent::ModeratorStart { content } => {
                let text = if content.is_empty() {
                    "Synthesizing...".to_string()
                } else {
                    content
                };
                vec![RenderOp::StatusLine { text }]
            }
            CouncilEvent::ModeratorDone { content, model } => {
                vec![RenderOp::ModeratorCard { content, model }]
            }
            CouncilEvent::ModelLoading {
                agent,
                model,
                content,
            } => vec![RenderOp::StatusLine {
                text: progress_line(content, "Loading", agent, model),
            }],
            CouncilEvent::ModelLoaded {
                agent,
                model,
                content,
            } => vec![RenderOp::StatusLine {
                text: progress_line(content, "Loaded", agent, model),
            }],
            CouncilEvent::Error { message } => {
                self.finish_session("error");
                vec![RenderOp::ErrorLine { message }]
            }
            CouncilEvent::CouncilDone => {
                self.finish_session("council_done");
                let mut ops = vec![RenderOp::SessionEnded {
                    elapsed: self.last_elapsed.unwrap_or_default(),
                }];
                ops.extend(self.leaderboard());
                ops
            }
            CouncilEvent::Unknown { kind } => {
                debug!("event_ignored: unknown kind {kind}");
                Vec::new()
            }
        }
    }

    fn handle_idle_event(&mut self, event: CouncilEvent) -> Vec<RenderOp> {
        match event {
            // Informational traffic is still worth a line while idle; the
            // backend answers malformed submissions with error events too.
            CouncilEvent::Status { content } => vec![RenderOp::StatusLine { text: content }],
            CouncilEvent::Error { message } => vec![RenderOp::ErrorLine { message }],
            other => {
                debug!("event_ignored_while_idle: {other:?}");
                Vec::new()
            }
        }
    }

    /// Last `agent_done` for an identity wins; order rank is kept from the
    /// first time the agent scored.
    fn record_score(&mut self, agent: &str, content: &str) {
        let scores = score(content);
        if let Some(existing) = self.board.iter_mut().find(|record| record.agent == agent) {
            existing.scores = scores;
        } else {
            self.board.push(ScoreRecord {
                agent: agent.to_string(),
                scores,
            });
        }
    }

    fn finish_session(&mut self, cause: &str) {
        self.last_elapsed = self.started_at.take().map(|started| started.elapsed());
        self.phase = Phase::Idle;
        info!("session_finished: cause={cause} agents_scored={}", self.board.len());
    }
}

fn progress_line(content: String, verb: &str, agent: String, model: Option<String>) -> String {
    if !content.is_empty() {
        return content;
    }
    let target = model.unwrap_or(agent);
    format!("{verb} {target}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_core::{AgentSeat, CouncilInfo, PaletteSlot, SessionDefaults, Strategy};
    use std::collections::HashMap as Map;

    fn catalog() -> CouncilCatalog {
        let mut councils = Map::new();
        councils.insert(
            "general".to_string(),
            CouncilInfo {
                name: "General Council".to_string(),
                description: "Balanced debate".to_string(),
                strategy: Strategy::Debate,
                debate_rounds: 2,
                agents: vec![
                    AgentSeat {
                        role: "Analyst".to_string(),
                        model: "phi".to_string(),
                    },
                    AgentSeat {
                        role: "Skeptic".to_string(),
                        model: "qwen".to_string(),
                    },
                ],
                moderator_model: Some("qwen".to_string()),
            },
        );
        councils.insert(
            "coding".to_string(),
            CouncilInfo {
                name: "Coding Council".to_string(),
                description: String::new(),
                strategy: Strategy::Pipeline,
                debate_rounds: 1,
                agents: Vec::new(),
                moderator_model: None,
            },
        );
        CouncilCatalog {
            councils,
            defaults: SessionDefaults {
                temperature: 0.7,
                max_tokens: 2048,
                council: "general".to_string(),
            },
        }
    }

    fn running_machine() -> SessionMachine {
        let mut machine = SessionMachine::new(catalog());
        machine
            .submit_task("Compare the options.", true)
            .expect("submit accepted");
        machine
    }

    fn agent_done(agent: &str, content: &str) -> CouncilEvent {
        CouncilEvent::AgentDone {
            agent: agent.to_string(),
            round: 1,
            content: content.to_string(),
            model: Some("phi4-mini".to_string()),
        }
    }

    #[test]
    fn starts_on_the_default_council() {
        let machine = SessionMachine::new(catalog());
        assert_eq!(machine.selected_council(), "general");
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn submit_builds_task_message_and_starts_session() {
        let mut machine = SessionMachine::new(catalog());
        let submission = machine
            .submit_task("  Compare the options.  ", true)
            .expect("submit accepted");

        assert_eq!(submission.message.kind, "task");
        assert_eq!(submission.message.council, "general");
        assert_eq!(submission.message.task, "Compare the options.");
        assert!(submission.message.settings.is_none());
        assert!(matches!(
            submission.ops[0],
            RenderOp::SessionStarted {
                strategy: Strategy::Debate,
                ..
            }
        ));
        assert_eq!(machine.phase(), Phase::Running);
        assert!(machine.elapsed().is_some());
    }

    #[test]
    fn submit_attaches_settings_and_overrides_when_present() {
        let mut machine = SessionMachine::new(catalog());
        machine.set_generation_settings(GenerationSettings {
            temperature: Some(0.2),
            max_tokens: None,
            debate_rounds: Some(3),
        });
        machine.set_model_overrides(Map::from([(
            "moderator".to_string(),
            "qwen-7b".to_string(),
        )]));

        let submission = machine.submit_task("Go", true).expect("submit accepted");
        let settings = submission.message.settings.expect("settings attached");
        assert_eq!(settings.temperature, Some(0.2));
        assert_eq!(settings.debate_rounds, Some(3));
        let overrides = submission.message.model_overrides.expect("overrides attached");
        assert_eq!(overrides["moderator"], "qwen-7b");
    }

    #[test]
    fn submit_while_running_is_rejected_without_mutation() {
        let mut machine = running_machine();
        machine.handle_event(agent_done("Analyst", "First answer."));
        let records_before = machine.records().to_vec();
        let round_before = machine.round();

        let err = machine.submit_task("Another task", true).unwrap_err();
        assert_eq!(err, SubmitError::TaskInFlight);
        assert_eq!(machine.phase(), Phase::Running);
        assert_eq!(machine.records(), records_before.as_slice());
        assert_eq!(machine.round(), round_before);
    }

    #[test]
    fn submit_requires_connection_and_text() {
        let mut machine = SessionMachine::new(catalog());
        assert_eq!(
            machine.submit_task("Task", false).unwrap_err(),
            SubmitError::NotConnected
        );
        assert_eq!(
            machine.submit_task("   \n\t", true).unwrap_err(),
            SubmitError::EmptyTask
        );
        assert_eq!(machine.phase(), Phase::Idle);
        assert!(machine.records().is_empty());
    }

    #[test]
    fn submission_resets_prior_session_state() {
        let mut machine = running_machine();
        machine.handle_event(agent_done("Analyst", "Answer."));
        machine.handle_event(CouncilEvent::CouncilDone);
        assert_eq!(machine.records().len(), 1);

        machine.submit_task("Next task", true).expect("resubmit");
        assert!(machine.records().is_empty());
        assert_eq!(machine.round(), 0);
        // First agent of the new session claims the first slot again.
        let ops = machine.handle_event(agent_done("Skeptic", "Reply."));
        match &ops[0] {
            RenderOp::AgentCard { slot, .. } => assert_eq!(*slot, PaletteSlot(0)),
            other => panic!("expected agent card, got {other:?}"),
        }
    }

    #[test]
    fn blank_agent_output_renders_placeholder_and_still_scores() {
        let mut machine = running_machine();
        let ops = machine.handle_event(agent_done("Alpha", "  "));

        match &ops[0] {
            RenderOp::AgentCard { content, agent, .. } => {
                assert_eq!(agent, "Alpha");
                assert_eq!(content, EMPTY_OUTPUT_PLACEHOLDER);
            }
            other => panic!("expected agent card, got {other:?}"),
        }
        assert_eq!(machine.records().len(), 1);
        assert_eq!(
            machine.records()[0].scores,
            council_core::score(EMPTY_OUTPUT_PLACEHOLDER)
        );
    }

    #[test]
    fn repeated_agent_done_keeps_last_score_and_first_order() {
        let mut machine = running_machine();
        machine.handle_event(agent_done("Analyst", "Round one answer."));
        machine.handle_event(agent_done("Skeptic", "Counterpoint."));
        machine.handle_event(agent_done(
            "Analyst",
            "A much longer refined second-round answer with more detail.",
        ));

        assert_eq!(machine.records().len(), 2);
        assert_eq!(machine.records()[0].agent, "Analyst");
        assert_eq!(
            machine.records()[0].scores,
            council_core::score("A much longer refined second-round answer with more detail.")
        );
        // Same identity, same palette slot both times.
        let ops = machine.handle_event(agent_done("Analyst", "again"));
        match &ops[0] {
            RenderOp::AgentCard { slot, .. } => assert_eq!(*slot, PaletteSlot(0)),
            other => panic!("expected agent card, got {other:?}"),
        }
    }

    #[test]
    fn round_start_advances_round_counter() {
        let mut machine = running_machine();
        let ops = machine.handle_event(CouncilEvent::RoundStart {
            round: 1,
            total_rounds: Some(2),
        });
        assert_eq!(
            ops[0],
            RenderOp::RoundMarker {
                round: 1,
                total_rounds: Some(2),
            }
        );
        machine.handle_event(CouncilEvent::RoundStart {
            round: 2,
            total_rounds: Some(2),
        });
        assert_eq!(machine.round(), 2);
    }

    #[test]
    fn moderator_output_renders_reserved_card_and_is_not_ranked() {
        let mut machine = running_machine();
        machine.handle_event(agent_done("Analyst", "Answer."));
        let ops = machine.handle_event(CouncilEvent::ModeratorDone {
            content: "Synthesis of the debate.".to_string(),
            model: Some("qwen".to_string()),
        });

        assert!(matches!(ops[0], RenderOp::ModeratorCard { .. }));
        assert_eq!(machine.records().len(), 1);
        assert_eq!(machine.records()[0].agent, "Analyst");
    }

    #[test]
    fn council_done_finishes_exactly_once() {
        let mut machine = running_machine();
        machine.handle_event(agent_done("Analyst", "Answer."));
        let ops = machine.handle_event(CouncilEvent::CouncilDone);

        assert_eq!(machine.phase(), Phase::Idle);
        assert!(matches!(ops[0], RenderOp::SessionEnded { .. }));
        assert!(matches!(ops[1], RenderOp::Leaderboard { .. }));
        assert!(machine.elapsed().is_some());

        // A duplicate terminal event is dropped, not re-rendered.
        let ops = machine.handle_event(CouncilEvent::CouncilDone);
        assert!(ops.is_empty());
    }

    #[test]
    fn error_event_aborts_to_idle_with_verbatim_message() {
        let mut machine = running_machine();
        let ops = machine.handle_event(CouncilEvent::Error {
            message: "Council session failed: model crashed".to_string(),
        });

        assert_eq!(machine.phase(), Phase::Idle);
        assert_eq!(
            ops[0],
            RenderOp::ErrorLine {
                message: "Council session failed: model crashed".to_string(),
            }
        );
        // Resubmission is possible immediately after the abort.
        assert!(machine.submit_task("Retry", true).is_ok());
    }

    #[test]
    fn weight_change_reranks_cached_scores_without_new_events() {
        let mut machine = running_machine();
        machine.handle_event(agent_done("Alpha", &"alpha answer text ".repeat(30)));
        machine.handle_event(agent_done("Beta", "terse"));
        machine.handle_event(CouncilEvent::CouncilDone);

        let records_before = machine.records().to_vec();
        let first = machine.leaderboard().expect("leaderboard available");
        let second = machine
            .set_weights(RubricWeights::new(0.0, 0.0, 100.0, 0.0))
            .expect("leaderboard available");

        assert_eq!(machine.records(), records_before.as_slice());
        let leader = |op: &RenderOp| match op {
            RenderOp::Leaderboard { entries } => entries[0].agent.clone(),
            other => panic!("expected leaderboard, got {other:?}"),
        };
        // Conciseness-only weighting must put the terse agent on top.
        assert_eq!(leader(&second), "Beta");
        // And the original mixed weighting favored the longer answer.
        assert_eq!(leader(&first), "Alpha");
    }

    #[test]
    fn progress_and_status_events_do_not_change_state() {
        let mut machine = running_machine();
        let before = machine.phase();
        for event in [
            CouncilEvent::Status {
                content: "Starting General Council (debate strategy)".to_string(),
            },
            CouncilEvent::AgentStart {
                agent: "Analyst".to_string(),
                model: Some("phi4-mini".to_string()),
            },
            CouncilEvent::ModelLoading {
                agent: "Analyst".to_string(),
                model: Some("phi4-mini".to_string()),
                content: "Loading model phi4-mini...".to_string(),
            },
            CouncilEvent::ModelLoaded {
                agent: "Analyst".to_string(),
                model: Some("phi4-mini".to_string()),
                content: String::new(),
            },
            CouncilEvent::ModeratorStart {
                content: String::new(),
            },
            CouncilEvent::RoundDone { round: 1 },
            CouncilEvent::Unknown {
                kind: "model_unloaded".to_string(),
            },
        ] {
            let ops = machine.handle_event(event);
            assert_eq!(machine.phase(), before);
            assert!(machine.records().is_empty());
            for op in ops {
                assert!(
                    matches!(op, RenderOp::StatusLine { .. }),
                    "unexpected op {op:?}"
                );
            }
        }
    }

    #[test]
    fn non_terminal_events_while_idle_are_dropped() {
        let mut machine = SessionMachine::new(catalog());
        assert!(machine.handle_event(agent_done("Analyst", "late")).is_empty());
        assert!(machine
            .handle_event(CouncilEvent::RoundStart {
                round: 1,
                total_rounds: None,
            })
            .is_empty());
        assert!(machine.records().is_empty());

        // Informational lines still render while idle.
        let ops = machine.handle_event(CouncilEvent::Error {
            message: "Task cannot be empty.".to_string(),
        });
        assert!(matches!(ops[0], RenderOp::ErrorLine { .. }));
    }

    #[test]
    fn select_council_ignores_unknown_keys() {
        let mut machine = SessionMachine::new(catalog());
        assert!(machine.select_council("coding"));
        assert_eq!(machine.selected_council(), "coding");
        assert!(!machine.select_council("nope"));
        assert_eq!(machine.selected_council(), "coding");
    }

    #[test]
    fn clear_session_resets_when_idle_only() {
        let mut machine = running_machine();
        machine.handle_event(agent_done("Analyst", "Answer."));
        assert!(!machine.clear_session());
        assert_eq!(machine.records().len(), 1);

        machine.handle_event(CouncilEvent::CouncilDone);
        assert!(machine.clear_session());
        assert!(machine.records().is_empty());
        assert!(machine.elapsed().is_none());
        assert!(machine.leaderboard().is_none());
    }

    #[test]
    fn color_assignment_is_stable_and_cycles_after_five() {
        let mut machine = running_machine();
        let mut slots = Vec::new();
        for agent in ["A", "B", "C", "D", "E", "F"] {
            let ops = machine.handle_event(agent_done(agent, "answer"));
            match &ops[0] {
                RenderOp::AgentCard { slot, .. } => slots.push(*slot),
                other => panic!("expected agent card, got {other:?}"),
            }
        }
        let distinct: std::collections::HashSet<u8> =
            slots.iter().take(5).map(|slot| slot.0).collect();
        assert_eq!(distinct.len(), 5);
        assert_eq!(slots[5], slots[0]);
    }
}
