use crate::app::{App, Exit, Mode};
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::filter::Preset;
use crate::model::{CapsuleRow, CiCheckState, GhostRow, Row};
use crate::msg::{Action, Msg};
use crate::palette::PaletteState;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use crossterm::tty::IsTty;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::io::{self, Stderr};
use std::process::Command;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

type Term = Terminal<CrosstermBackend<Stderr>>;

fn truncate_ellipsis(s: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }

    let mut out = String::new();
    let mut w = 0usize;
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if w + cw > max_width {
            break;
        }
        out.push(ch);
        w += cw;
    }

    // Make room for the ellipsis (width 1).
    while !out.is_empty() && UnicodeWidthStr::width(out.as_str()) + 1 > max_width {
        out.pop();
    }
    out.push('…');
    out
}

fn pad_right(s: &str, width: usize) -> String {
    let len = UnicodeWidthStr::width(s);
    if len >= width {
        s.to_string()
    } else {
        let mut out = String::with_capacity(width);
        out.push_str(s);
        out.extend(std::iter::repeat_n(' ', width - len));
        out
    }
}

pub fn open_in_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    let mut cmd = {
        let mut c = Command::new("open");
        c.arg(url);
        c
    };

    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut cmd = {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };

    cmd.spawn().map(|_| ()).map_err(|source| Error::Spawn {
        program: "browser opener",
        source,
    })
}

/// Key binding for `mode`, if any.
pub fn key_action(mode: &Mode, key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match mode {
        Mode::Normal => match key.code {
            KeyCode::Char('c') if ctrl => Some(Action::Quit),
            KeyCode::Char('p') if ctrl => Some(Action::OpenPalette),
            KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::Down),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::Up),
            KeyCode::Char('g') | KeyCode::Home => Some(Action::First),
            KeyCode::Char('G') | KeyCode::End => Some(Action::Last),
            KeyCode::Enter => Some(Action::Open),
            KeyCode::Char('o') => Some(Action::OpenPr),
            KeyCode::Char('b') => Some(Action::ToggleBoard),
            KeyCode::Char('d') => Some(Action::Delete),
            KeyCode::Char('c') => Some(Action::CreateFromGhost),
            KeyCode::Char('R') => Some(Action::Refresh),
            KeyCode::Char('/') => Some(Action::StartFilter),
            KeyCode::Char(':') => Some(Action::OpenPalette),
            KeyCode::Char('0') => Some(Action::ClearPresets),
            KeyCode::Char(ch @ '1'..='4') => {
                let i = ch as usize - '1' as usize;
                Some(Action::TogglePreset(Preset::ALL[i]))
            }
            _ => None,
        },
        Mode::Filter => match key.code {
            KeyCode::Esc => Some(Action::ClearFilter),
            KeyCode::Enter => Some(Action::EndFilter),
            KeyCode::Backspace => Some(Action::FilterBackspace),
            KeyCode::Down => Some(Action::Down),
            KeyCode::Up => Some(Action::Up),
            KeyCode::Char(ch) if !ctrl => Some(Action::FilterChar(ch)),
            _ => None,
        },
        Mode::Palette(_) => match key.code {
            KeyCode::Esc => Some(Action::ClosePalette),
            KeyCode::Enter => Some(Action::PaletteRun),
            KeyCode::Backspace => Some(Action::PaletteBackspace),
            KeyCode::Up => Some(Action::PaletteUp),
            KeyCode::Down => Some(Action::PaletteDown),
            KeyCode::Char('p') if ctrl => Some(Action::PaletteUp),
            KeyCode::Char('n') if ctrl => Some(Action::PaletteDown),
            KeyCode::Char(ch) if !ctrl => Some(Action::PaletteChar(ch)),
            _ => None,
        },
        Mode::Confirm(_) => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::Confirm),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(Action::Cancel),
            _ => None,
        },
    }
}

fn capsule_line(c: &CapsuleRow, width: usize) -> String {
    let name = pad_right(&truncate_ellipsis(&c.name, 18), 18);
    let branch = if c.loaded {
        c.branch.clone()
    } else {
        "…".to_string()
    };
    let mut flags = String::new();
    if c.dirty {
        flags.push('*');
    }
    if c.ahead > 0 {
        flags.push_str(&format!("↑{}", c.ahead));
    }
    if c.behind > 0 {
        flags.push_str(&format!("↓{}", c.behind));
    }
    let pr = c
        .pr
        .as_ref()
        .map(|p| format!("#{} {} {}", p.number, p.ci.glyph(), p.review.as_str()))
        .unwrap_or_default();
    let mut marks = String::new();
    if c.boarded {
        marks.push('B');
    }
    if c.live {
        marks.push('T');
    }
    if c.merged {
        marks.push('M');
    }
    let fixed = 18 + 2 + 8 + 2 + 18 + 2 + 3;
    let branch_w = width.saturating_sub(fixed).max(8);
    format!(
        "{name}  {}  {}  {}  {}",
        pad_right(&truncate_ellipsis(&branch, branch_w), branch_w),
        pad_right(&flags, 8),
        pad_right(&truncate_ellipsis(&pr, 18), 18),
        marks
    )
}

fn ghost_line(g: &GhostRow, width: usize) -> String {
    let head = format!("+ #{} {}", g.pr.number, g.branch);
    let head = pad_right(&truncate_ellipsis(&head, 30), 30);
    let title = truncate_ellipsis(&g.pr.title, width.saturating_sub(34));
    format!("{head}  {title}")
}

fn list_lines(app: &App, width: usize, height: usize) -> Vec<Line<'static>> {
    let shown = app.shown_rows();
    let at = shown.iter().position(|&i| i == app.cursor).unwrap_or(0);
    let offset = (at + 1).saturating_sub(height);

    shown
        .iter()
        .skip(offset)
        .take(height)
        .map(|&i| {
            let selected = i == app.cursor;
            let prefix = if selected { "> " } else { "  " };
            let inner = width.saturating_sub(2);
            let (text, style) = match &app.rows[i] {
                Row::Header { repo } => {
                    let err = app
                        .repo(repo)
                        .and_then(|d| d.error.as_deref())
                        .map(|e| format!("  ({e})"))
                        .unwrap_or_default();
                    (
                        format!("{repo}{err}"),
                        Style::default().add_modifier(Modifier::BOLD),
                    )
                }
                Row::Capsule(c) => {
                    let style = if c.merged {
                        Style::default().fg(Color::DarkGray)
                    } else if c.dirty {
                        Style::default().fg(Color::Yellow)
                    } else {
                        Style::default()
                    };
                    (capsule_line(c, inner), style)
                }
                Row::Ghost(g) => {
                    let style = Style::default().add_modifier(Modifier::DIM);
                    (ghost_line(g, inner), style)
                }
            };
            let style = if selected {
                style.add_modifier(Modifier::REVERSED)
            } else {
                style
            };
            Line::from(Span::styled(
                format!("{prefix}{}", truncate_ellipsis(&text, inner)),
                style,
            ))
        })
        .collect()
}

fn check_glyph(state: CiCheckState) -> &'static str {
    match state {
        CiCheckState::Success => "✓",
        CiCheckState::Failure => "✗",
        CiCheckState::Running => "●",
        CiCheckState::Neutral => "-",
        CiCheckState::None => " ",
    }
}

fn section(lines: &mut Vec<Line<'static>>, title: &str) {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        title.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
}

fn push_link(lines: &mut Vec<Line<'static>>, url: Option<&str>) {
    if let Some(url) = url.filter(|u| !u.is_empty()) {
        lines.push(Line::from(Span::styled(
            format!("  {url}"),
            Style::default().fg(Color::Blue).add_modifier(Modifier::DIM),
        )));
    }
}

fn detail_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let Some(row) = app.current_row() else {
        return lines;
    };
    let heading = match row {
        Row::Header { repo } => repo.clone(),
        Row::Capsule(c) => format!("{}/{}  {}", c.repo, c.name, c.branch),
        Row::Ghost(g) => format!("{}  (no capsule)", g.branch),
    };
    lines.push(Line::from(Span::styled(
        heading,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    let current = app.detail_is_current();
    if let Some(pr) = row.pr() {
        let title = if current && !app.detail.pr_title.is_empty() {
            &app.detail.pr_title
        } else {
            &pr.title
        };
        lines.push(Line::from(format!("#{} {title}  by {}", pr.number, pr.author)));
        lines.push(Line::from(Span::styled(
            pr.url.clone(),
            Style::default().fg(Color::Blue),
        )));
    }
    if !current {
        lines.push(Line::from(Span::styled(
            "loading…",
            Style::default().add_modifier(Modifier::DIM),
        )));
        return lines;
    }

    let d = &app.detail;
    if !d.diff_stat.is_empty() {
        lines.push(Line::from(d.diff_stat.clone()));
    }
    if d.stash_count > 0 {
        lines.push(Line::from(format!("{} stash entries", d.stash_count)));
    }
    if !d.checks.is_empty() {
        section(&mut lines, "Checks");
        for c in &d.checks {
            lines.push(Line::from(format!("{} {}", check_glyph(c.state), c.name)));
            if c.state == CiCheckState::Failure {
                push_link(&mut lines, c.url.as_deref());
            }
        }
    }
    if !d.runs.is_empty() {
        section(&mut lines, "Workflow runs");
        for r in &d.runs {
            let outcome = r.conclusion.as_deref().unwrap_or(&r.status);
            lines.push(Line::from(format!("{}  {outcome}", r.name)));
            if outcome == "failure" {
                push_link(&mut lines, Some(&r.url));
            }
        }
    }
    if !d.commits.is_empty() {
        section(&mut lines, "Commits");
        lines.extend(d.commits.iter().map(|c| Line::from(c.clone())));
    }
    if !d.pr_body.trim().is_empty() {
        section(&mut lines, "Description");
        lines.extend(d.pr_body.lines().map(|l| Line::from(l.to_string())));
    }
    if !d.merged_history.is_empty() {
        section(&mut lines, "Recently merged");
        lines.extend(d.merged_history.iter().map(|m| Line::from(m.clone())));
    }
    lines
}

fn status_line(app: &App) -> Line<'static> {
    let text = match &app.mode {
        Mode::Filter => format!("/{}▏", app.filter),
        Mode::Confirm(c) => match app.rows.get(c.index) {
            Some(Row::Capsule(cap)) => format!("undock {}/{}? y/n", cap.repo, cap.name),
            _ => "undock? y/n".to_string(),
        },
        _ => {
            let mut parts = Vec::new();
            if !app.filter.is_empty() {
                parts.push(format!("/{}", app.filter));
            }
            let presets: Vec<&str> = app.presets.active().map(Preset::label).collect();
            if !presets.is_empty() {
                parts.push(format!("[{}]", presets.join(" ")));
            }
            parts.push(format!("{}/{} loaded", app.loaded, app.total));
            if app.pr_errors > 0 {
                parts.push(format!("{} PR errors", app.pr_errors));
            }
            if let Some(busy) = &app.busy {
                parts.push(format!("{busy}…"));
            }
            if let Some(flash) = &app.flash {
                parts.push(flash.clone());
            }
            parts.join("  ")
        }
    };
    Line::from(Span::styled(text, Style::default().add_modifier(Modifier::DIM)))
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 3,
        width: w,
        height: h,
    }
}

fn palette_lines(app: &App, state: &PaletteState) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(format!(": {}", state.query))];
    for (i, cmd) in app.palette_entries().iter().enumerate() {
        let text = format!("{}  {}", pad_right(cmd.name, 26), cmd.key);
        let style = if i == state.selected {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(text, style)));
    }
    lines
}

fn draw(terminal: &mut Term, app: &App) -> Result<()> {
    terminal
        .draw(|f| {
            let [main, bar] = Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(f.area());
            let [list, detail] =
                Layout::horizontal([Constraint::Percentage(58), Constraint::Percentage(42)]).areas(main);

            let inner_w = list.width.saturating_sub(2) as usize;
            let inner_h = list.height.saturating_sub(2) as usize;
            let title = format!(" {} ", app.root.display());
            f.render_widget(
                Paragraph::new(Text::from(list_lines(app, inner_w, inner_h)))
                    .block(Block::default().borders(Borders::ALL).title(title)),
                list,
            );
            f.render_widget(
                Paragraph::new(Text::from(detail_lines(app)))
                    .wrap(Wrap { trim: false })
                    .block(Block::default().borders(Borders::ALL)),
                detail,
            );
            f.render_widget(Paragraph::new(status_line(app)), bar);

            if let Mode::Palette(state) = &app.mode {
                let lines = palette_lines(app, state);
                let area = centered(f.area(), 50, lines.len() as u16 + 2);
                f.render_widget(Clear, area);
                f.render_widget(
                    Paragraph::new(Text::from(lines))
                        .block(Block::default().borders(Borders::ALL).title(" commands ")),
                    area,
                );
            }
        })
        .map_err(|e| Error::Terminal(format!("draw failed: {e}")))?;
    Ok(())
}

fn event_loop(
    terminal: &mut Term,
    app: &mut App,
    exec: &Executor,
    rx: &mut UnboundedReceiver<Msg>,
) -> Result<()> {
    loop {
        while let Ok(msg) = rx.try_recv() {
            let tasks = app.update(msg);
            exec.run_all(tasks);
        }
        if app.exit.is_some() {
            return Ok(());
        }

        draw(terminal, app)?;

        // Short poll keeps background results flowing onto the screen.
        if event::poll(Duration::from_millis(50))
            .map_err(|e| Error::Terminal(format!("event poll failed: {e}")))?
        {
            if let Event::Key(k) =
                event::read().map_err(|e| Error::Terminal(format!("event read failed: {e}")))?
            {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(action) = key_action(&app.mode, k) {
                    app.flash = None;
                    let tasks = app.update(Msg::Action(action));
                    exec.run_all(tasks);
                }
            }
        }
    }
}

/// Runs the dashboard on stderr until the user quits or picks a capsule.
pub fn run_tui(mut app: App, exec: &Executor, mut rx: UnboundedReceiver<Msg>) -> Result<Exit> {
    if !io::stdin().is_tty() || !io::stderr().is_tty() {
        return Err(Error::Terminal(
            "not a TTY: run `mctl` in an interactive terminal".to_string(),
        ));
    }
    enable_raw_mode().map_err(|e| Error::Terminal(format!("failed to enable raw mode: {e}")))?;
    let mut stderr = io::stderr();
    if let Err(e) = execute!(stderr, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(Error::Terminal(format!("failed to enter alt screen: {e}")));
    }

    let result = Terminal::new(CrosstermBackend::new(stderr))
        .map_err(|e| Error::Terminal(format!("failed to init terminal: {e}")))
        .and_then(|mut terminal| {
            let r = event_loop(&mut terminal, &mut app, exec, &mut rx);
            let _ = terminal.show_cursor();
            r
        });

    let _ = disable_raw_mode();
    let _ = execute!(io::stderr(), LeaveAlternateScreen);
    result?;
    Ok(app.exit.unwrap_or(Exit::Quit))
}
