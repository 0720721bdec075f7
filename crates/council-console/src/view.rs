use council_client::LinkStatus;
use council_core::{PaletteSlot, RankedAgent, TelemetryState, PALETTE_SIZE};
use council_session::RenderOp;
use crossterm::style::{Color, Stylize};
use std::io::{self, Write};
use std::time::Duration;

/// Agent card colors, indexed by palette slot.
const AGENT_COLORS: [Color; PALETTE_SIZE as usize] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
];

/// The moderator's reserved look, outside the agent palette.
const MODERATOR_COLOR: Color = Color::White;

const CLEAR_LINE: &str = "\r\x1b[2K";

fn agent_color(slot: PaletteSlot) -> Color {
    AGENT_COLORS[(slot.0 as usize) % AGENT_COLORS.len()]
}

/// Writes the conversation stream as styled lines and keeps a single
/// rewritten footer (link state, gauges, session clock) below it. Append-only
/// above the footer: nothing blocks, nothing is overwritten.
pub struct ConsoleRenderer<W: Write> {
    out: W,
    footer_active: bool,
    link: LinkStatus,
    telemetry: TelemetryState,
    clock: Option<Duration>,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            footer_active: false,
            link: LinkStatus::Disconnected,
            telemetry: TelemetryState::default(),
            clock: None,
        }
    }

    pub fn render(&mut self, op: &RenderOp) -> io::Result<()> {
        match op {
            RenderOp::StatusLine { text } => {
                self.stream_line(format!("  {}", text.as_str().dim()))
            }
            RenderOp::RoundMarker {
                round,
                total_rounds,
            } => {
                let label = match total_rounds {
                    Some(total) => format!("── round {round}/{total} ──"),
                    None => format!("── round {round} ──"),
                };
                self.stream_line(format!("{}", label.with(Color::Cyan)))
            }
            RenderOp::AgentCard {
                agent,
                slot,
                round,
                content,
                model,
            } => {
                let color = agent_color(*slot);
                let mut header = format!("◆ {agent}");
                if let Some(model) = model {
                    header.push_str(&format!("  [{model}]"));
                }
                if *round > 0 {
                    header.push_str(&format!("  (round {round})"));
                }
                self.stream_line(format!("{}", header.with(color).bold()))?;
                self.body_lines(content)
            }
            RenderOp::ModeratorCard { content, model } => {
                let mut header = "■ Moderator".to_string();
                if let Some(model) = model {
                    header.push_str(&format!("  [{model}]"));
                }
                self.stream_line(format!(
                    "{}",
                    header.with(MODERATOR_COLOR).bold().reverse()
                ))?;
                self.body_lines(content)
            }
            RenderOp::ErrorLine { message } => {
                self.stream_line(format!("{}", format!("✗ {message}").with(Color::Red)))
            }
            RenderOp::SessionStarted {
                council,
                name,
                strategy,
            } => self.stream_line(format!(
                "{}",
                format!("▶ {name} ({council}, {strategy} strategy)").with(Color::Green)
            )),
            RenderOp::SessionEnded { elapsed } => {
                self.clock = None;
                self.stream_line(format!(
                    "{}",
                    format!("✔ council finished in {:.1}s", elapsed.as_secs_f64())
                        .with(Color::Green)
                ))
            }
            RenderOp::Leaderboard { entries } => self.leaderboard(entries),
        }
    }

    /// One informational line outside the event stream (submit rejections,
    /// command feedback).
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        self.stream_line(format!("  {}", text.dim()))
    }

    pub fn connection(&mut self, status: LinkStatus) -> io::Result<()> {
        self.link = status;
        let color = match status {
            LinkStatus::Connected => Color::Green,
            LinkStatus::Connecting => Color::Yellow,
            LinkStatus::Disconnected => Color::Red,
        };
        self.stream_line(format!("{}", format!("● link {}", status.as_str()).with(color)))
    }

    pub fn telemetry(&mut self, state: &TelemetryState) -> io::Result<()> {
        self.telemetry = state.clone();
        self.redraw_footer()
    }

    pub fn clock(&mut self, elapsed: Duration) -> io::Result<()> {
        self.clock = Some(elapsed);
        self.redraw_footer()
    }

    fn leaderboard(&mut self, entries: &[RankedAgent]) -> io::Result<()> {
        self.stream_line(format!("{}", "─ leaderboard ─".with(Color::Cyan)))?;
        for (position, entry) in entries.iter().enumerate() {
            let line = format!(
                "  {}. {:<20} {:>5.2}   acc {:.1}  comp {:.1}  conc {:.1}  tone {:.1}",
                position + 1,
                entry.agent,
                entry.overall,
                entry.scores.accuracy,
                entry.scores.completeness,
                entry.scores.conciseness,
                entry.scores.tone,
            );
            if position == 0 {
                self.stream_line(format!("{}", line.bold()))?;
            } else {
                self.stream_line(line)?;
            }
        }
        Ok(())
    }

    fn body_lines(&mut self, content: &str) -> io::Result<()> {
        for line in content.lines() {
            self.stream_line(format!("    {line}"))?;
        }
        Ok(())
    }

    fn stream_line(&mut self, line: String) -> io::Result<()> {
        if self.footer_active {
            write!(self.out, "{CLEAR_LINE}")?;
            self.footer_active = false;
        }
        writeln!(self.out, "{line}")?;
        self.redraw_footer()
    }

    fn redraw_footer(&mut self) -> io::Result<()> {
        let mut segments = vec![format!("link {}", self.link.as_str())];
        segments.push(format!(
            "backend {}",
            if self.telemetry.backend_connected {
                "up"
            } else {
                "down"
            }
        ));
        for (label, value) in [
            ("cpu", self.telemetry.cpu),
            ("ram", self.telemetry.ram),
            ("gpu", self.telemetry.gpu),
            ("vram", self.telemetry.vram),
        ] {
            segments.push(match value {
                Some(pct) => format!("{label} {pct:.0}%"),
                None => format!("{label} --"),
            });
        }
        if let Some(elapsed) = self.clock {
            segments.push(format!("⏱ {}s", elapsed.as_secs()));
        }
        write!(
            self.out,
            "{CLEAR_LINE}{}",
            segments.join(" · ").as_str().dim()
        )?;
        self.footer_active = true;
        self.out.flush()
    }
}
