use ratatui::prelude::*;
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Clear, Padding, Paragraph};

use crate::app::{App, CommandSuggestion, Pane, Speaker, TranscriptEntry};
use crate::conversation::TurnReply;
use crate::segments::FeedbackKind;
use crate::text_layout::wrap_text;
use crate::theme::Theme;

const MAX_INPUT_TEXT_LINES: u16 = 5;
const TEXT_PADDING: u16 = 1;
const STATUS_HEIGHT: u16 = 1;
const TITLE_BAR_HEIGHT: u16 = 1;
const ACTIVE_TITLE_FG: Color = Color::Black;
const STATUS_HELP_TEXT: &str = "Tab focus | Enter send | Alt+Enter newline | PgUp/PgDn scroll | /help";
const EMPTY_INSIGHTS: &str =
    "Thinking, plan, todos, feedback, code and file actions from the last reply show here.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Heading,
    Body,
    Muted,
    Success,
    Warning,
    Error,
}

struct PaneAreas {
    transcript_messages: Rect,
    transcript_input: Rect,
    transcript_title: Rect,
    insights_title: Rect,
    insights_content: Rect,
    status: Rect,
}

fn layout(screen: Rect, app: &App) -> PaneAreas {
    let [body, status] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(STATUS_HEIGHT)]).areas(screen);
    let [transcript, insights] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(body);
    let [transcript_title, transcript_content] =
        Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)])
            .areas(transcript);
    let [insights_title, insights_content] =
        Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)]).areas(insights);

    let input_width = text_width(transcript_content);
    let input_lines = app.input_layout(input_width).height();
    let max_input_height = transcript_content.height.saturating_sub(1).max(1);
    let (input_height, _) = input_box_metrics(input_lines, 0, max_input_height);
    let [transcript_messages, transcript_input] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(input_height)])
            .areas(transcript_content);

    PaneAreas {
        transcript_messages,
        transcript_input,
        transcript_title,
        insights_title,
        insights_content,
        status,
    }
}

fn text_width(area: Rect) -> u16 {
    area.width.saturating_sub(TEXT_PADDING * 2).max(1)
}

fn text_height(area: Rect) -> u16 {
    area.height.saturating_sub(TEXT_PADDING * 2)
}

pub fn input_text_width(screen: Rect, app: &App) -> u16 {
    text_width(layout(screen, app).transcript_input)
}

pub fn transcript_max_scroll(screen: Rect, app: &App) -> u16 {
    let area = layout(screen, app).transcript_messages;
    let total = transcript_rows(app.transcript(), text_width(area)).len() as u16;
    total.saturating_sub(text_height(area))
}

pub fn insights_max_scroll(screen: Rect, app: &App) -> u16 {
    let area = layout(screen, app).insights_content;
    let total = insight_rows(app.last_reply(), text_width(area)).len() as u16;
    total.saturating_sub(text_height(area))
}

pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    let areas = layout(frame.area(), app);

    render_title(
        frame,
        areas.transcript_title,
        &format!("Transcript | {} mode", app.session.mode.label()),
        app.active_pane == Pane::Transcript,
        theme.transcript_bg,
        theme,
    );
    render_transcript(frame, &areas, app, theme);

    render_title(
        frame,
        areas.insights_title,
        "Insights",
        app.active_pane == Pane::Insights,
        theme.insights_bg,
        theme,
    );
    render_insights(frame, areas.insights_content, app, theme);

    frame.render_widget(
        Paragraph::new(status_line_text(app))
            .style(Style::default().bg(theme.status_bg).fg(theme.muted_fg)),
        areas.status,
    );

    if app.is_picker_open() {
        render_model_picker(frame, app, theme);
    }
}

fn render_title(frame: &mut Frame, area: Rect, title: &str, active: bool, base: Color, theme: &Theme) {
    let (bg, fg) = if active {
        (theme.accent_fg, ACTIVE_TITLE_FG)
    } else {
        (title_bar_bg(base), theme.muted_fg)
    };
    frame.render_widget(
        Paragraph::new(format!(" {title}")).style(Style::default().bg(bg).fg(fg)),
        area,
    );
}

fn render_transcript(frame: &mut Frame, areas: &PaneAreas, app: &App, theme: &Theme) {
    let messages_area = areas.transcript_messages;
    let input_area = areas.transcript_input;

    let rows = transcript_rows(app.transcript(), text_width(messages_area));
    let max_scroll = (rows.len() as u16).saturating_sub(text_height(messages_area));
    let scroll = max_scroll.saturating_sub(app.transcript_offset().min(max_scroll));
    let lines = rows
        .into_iter()
        .map(|(speaker, row)| Line::styled(row, speaker_style(speaker, theme)))
        .collect::<Vec<_>>();
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .scroll((scroll, 0))
            .style(Style::default().bg(theme.transcript_bg).fg(theme.text_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.transcript_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        messages_area,
    );

    let input_width = text_width(input_area);
    let wrapped_input = app.input_layout(input_width);
    let (cursor_row, cursor_col) = app.cursor_row_col(input_width);
    let (_, input_scroll) = input_box_metrics(wrapped_input.height(), cursor_row, input_area.height);
    frame.render_widget(
        Paragraph::new(wrapped_input.lines.join("\n"))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.input_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            )
            .style(Style::default().bg(theme.input_bg).fg(theme.text_fg))
            .scroll((input_scroll, 0)),
        input_area,
    );

    if app.should_show_command_index() {
        render_command_index(frame, app.command_suggestions(), messages_area, input_area, theme);
    }

    if app.active_pane == Pane::Transcript && !app.is_picker_open() {
        let inner = input_area.inner(Margin {
            horizontal: TEXT_PADDING,
            vertical: TEXT_PADDING,
        });
        let visible_row = cursor_row.saturating_sub(input_scroll);
        if inner.width > 0 && inner.height > 0 && visible_row < inner.height {
            frame.set_cursor_position((
                inner.x + cursor_col.min(inner.width - 1),
                inner.y + visible_row,
            ));
        }
    }
}

fn render_insights(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let rows = insight_rows(app.last_reply(), text_width(area));
    let max_scroll = (rows.len() as u16).saturating_sub(text_height(area));
    let lines = rows
        .into_iter()
        .map(|(tone, row)| Line::styled(row, tone_style(tone, theme)))
        .collect::<Vec<_>>();
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .scroll((app.insights_scroll().min(max_scroll), 0))
            .style(Style::default().bg(theme.insights_bg).fg(theme.text_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.insights_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        area,
    );
}

fn status_line_text(app: &App) -> String {
    let mut parts = vec![
        format!(" {}", app.session.mode.label()),
        app.model_label(),
        app.backend_label().to_string(),
    ];
    if let Some(document) = app.document() {
        parts.push(format!("doc: {document}"));
    }
    if app.is_busy() {
        parts.push(format!("Working {}", working_dots(app.ticks)));
    }
    parts.push(STATUS_HELP_TEXT.to_string());
    parts.join(" | ")
}

fn working_dots(ticks: u64) -> &'static str {
    const FRAMES: [&str; 6] = ["[   ]", "[.  ]", "[.. ]", "[...]", "[ ..]", "[  .]"];
    FRAMES[((ticks / 2) as usize) % FRAMES.len()]
}

fn render_command_index(
    frame: &mut Frame,
    suggestions: Vec<CommandSuggestion>,
    messages_area: Rect,
    input_area: Rect,
    theme: &Theme,
) {
    if suggestions.is_empty() || messages_area.height == 0 || input_area.width == 0 {
        return;
    }
    let max_items = messages_area.height.saturating_sub(2).max(1) as usize;
    let shown = suggestions.into_iter().take(max_items).collect::<Vec<_>>();
    let overlay_height = (shown.len() as u16)
        .saturating_add(2)
        .min(messages_area.height.max(1));
    let y = input_area
        .y
        .saturating_sub(overlay_height)
        .max(messages_area.y);
    let overlay = Rect::new(input_area.x, y, input_area.width, overlay_height);

    let lines = shown
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let style = if idx == 0 {
                Style::default().fg(theme.active_fg)
            } else {
                Style::default().fg(theme.text_fg)
            };
            Line::from(vec![
                Span::styled(item.command, style),
                Span::raw(" "),
                Span::styled(item.description, Style::default().fg(theme.muted_fg)),
            ])
        })
        .collect::<Vec<_>>();

    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(theme.input_bg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.input_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        overlay,
    );
}

fn render_model_picker(frame: &mut Frame, app: &App, theme: &Theme) {
    let models = app.picker_models();
    if models.is_empty() {
        return;
    }
    let screen = frame.area();
    let width = screen.width.clamp(20, 70);
    let max_rows = screen.height.saturating_sub(6).max(1);
    let shown_count = (models.len() as u16).min(max_rows);
    let height = shown_count.saturating_add(3).min(screen.height.max(3));
    let overlay = Rect::new(
        screen.x + screen.width.saturating_sub(width) / 2,
        screen.y + screen.height.saturating_sub(height) / 2,
        width.min(screen.width),
        height,
    );

    let selected = app.picker_selected_index();
    let start = selected.saturating_sub((shown_count as usize).saturating_sub(1));
    let mut lines = vec![Line::from(vec![
        Span::styled(
            "Select Model",
            Style::default()
                .fg(theme.active_fg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            "(Up/Down move, Enter select, Esc cancel)",
            Style::default().fg(theme.muted_fg),
        ),
    ])];
    for (idx, model) in models.iter().enumerate().skip(start).take(shown_count as usize) {
        let is_selected = idx == selected;
        let style = if is_selected {
            Style::default()
                .fg(theme.active_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text_fg)
        };
        lines.push(Line::from(vec![
            Span::styled(if is_selected { "> " } else { "  " }, Style::default().fg(theme.accent_fg)),
            Span::styled(model.id.clone(), style),
            Span::styled(
                format!(" ({})", model.provider.as_str()),
                Style::default().fg(theme.muted_fg),
            ),
        ]));
    }

    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(theme.input_bg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.input_bg))
                    .padding(Padding::horizontal(TEXT_PADDING)),
            ),
        overlay,
    );
}

fn transcript_rows(entries: &[TranscriptEntry], width: u16) -> Vec<(Speaker, String)> {
    let mut rows = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        if idx > 0 {
            rows.push((entry.speaker, String::new()));
        }
        let text = format!("{}: {}", entry.speaker.label(), entry.text);
        rows.extend(
            wrap_text(&text, width)
                .lines
                .into_iter()
                .map(|row| (entry.speaker, row)),
        );
    }
    rows
}

fn insight_rows(reply: Option<&TurnReply>, width: u16) -> Vec<(Tone, String)> {
    insight_lines(reply)
        .into_iter()
        .flat_map(|(tone, line)| {
            wrap_text(&line, width)
                .lines
                .into_iter()
                .map(move |row| (tone, row))
        })
        .collect()
}

fn insight_lines(reply: Option<&TurnReply>) -> Vec<(Tone, String)> {
    let Some(reply) = reply else {
        return vec![(Tone::Muted, EMPTY_INSIGHTS.to_string())];
    };
    let segments = &reply.segments;
    let mut lines = vec![(
        Tone::Muted,
        format!("{} reply from {}", reply.mode.label(), reply.model),
    )];

    let section = |lines: &mut Vec<(Tone, String)>, title: &str| {
        lines.push((Tone::Body, String::new()));
        lines.push((Tone::Heading, title.to_string()));
    };

    if let Some(path) = &reply.edited {
        section(&mut lines, "Document");
        lines.push((Tone::Success, format!("Updated {}", path.display())));
    }
    if let Some(thinking) = &segments.thinking {
        section(&mut lines, "Thinking");
        lines.push((Tone::Muted, thinking.clone()));
    }
    if let Some(plan) = &segments.plan {
        section(&mut lines, "Plan");
        lines.push((Tone::Body, plan.clone()));
    }
    if !segments.todos.is_empty() {
        section(&mut lines, "Todos");
        for todo in &segments.todos {
            let mark = if todo.completed { "[x]" } else { "[ ]" };
            let tone = if todo.completed { Tone::Muted } else { Tone::Body };
            lines.push((tone, format!("{mark} {:<4} {}", todo.priority.label(), todo.task)));
        }
    }
    if !segments.feedbacks.is_empty() {
        section(&mut lines, "Feedback");
        for feedback in &segments.feedbacks {
            let (tone, label) = match feedback.level() {
                FeedbackKind::Info => (Tone::Body, "INFO"),
                FeedbackKind::Success => (Tone::Success, "OK"),
                FeedbackKind::Warning => (Tone::Warning, "WARN"),
                FeedbackKind::Error => (Tone::Error, "ERROR"),
            };
            lines.push((tone, format!("{label}: {}", feedback.text)));
        }
    }
    if !reply.actions.is_empty() {
        section(&mut lines, "File actions");
        for result in &reply.actions {
            match &result.outcome {
                Ok(()) => lines.push((
                    Tone::Success,
                    format!("{} {}", result.action.past_tense(), result.path),
                )),
                Err(message) => lines.push((
                    Tone::Error,
                    format!("failed {}: {message}", result.path),
                )),
            }
        }
    }
    if !segments.code_blocks.is_empty() {
        section(&mut lines, "Code");
        for block in &segments.code_blocks {
            lines.push((Tone::Muted, format!("[{}]", block.lang)));
            lines.push((Tone::Body, block.code.clone()));
        }
    }
    lines
}

fn speaker_style(speaker: Speaker, theme: &Theme) -> Style {
    match speaker {
        Speaker::You => Style::default().fg(theme.accent_fg),
        Speaker::Assistant => Style::default().fg(theme.text_fg),
        Speaker::System => Style::default()
            .fg(theme.muted_fg)
            .add_modifier(Modifier::DIM),
        Speaker::Error => Style::default().fg(theme.error_fg),
    }
}

fn tone_style(tone: Tone, theme: &Theme) -> Style {
    match tone {
        Tone::Heading => Style::default()
            .fg(theme.active_fg)
            .add_modifier(Modifier::BOLD),
        Tone::Body => Style::default().fg(theme.text_fg),
        Tone::Muted => Style::default().fg(theme.muted_fg),
        Tone::Success => Style::default().fg(theme.success_fg),
        Tone::Warning => Style::default().fg(theme.warning_fg),
        Tone::Error => Style::default().fg(theme.error_fg),
    }
}

fn input_box_metrics(input_text_lines: u16, cursor_line: u16, max_input_height: u16) -> (u16, u16) {
    let capped_text_lines = input_text_lines.clamp(1, MAX_INPUT_TEXT_LINES);
    let desired_height = capped_text_lines.saturating_add(TEXT_PADDING * 2);
    let input_height = desired_height.clamp(1, max_input_height.max(1));
    let visible_text_lines = input_height.saturating_sub(TEXT_PADDING * 2).max(1);
    let max_scroll = input_text_lines.saturating_sub(visible_text_lines);
    let input_scroll = cursor_line
        .saturating_sub(visible_text_lines.saturating_sub(1))
        .min(max_scroll);
    (input_height, input_scroll)
}

fn title_bar_bg(base: Color) -> Color {
    match base {
        Color::Rgb(r, g, b) => Color::Rgb(
            r.saturating_sub(12),
            g.saturating_sub(12),
            b.saturating_sub(12),
        ),
        _ => base,
    }
}

#[cfg(test)]
#[path = "../tests/unit/ui_tests.rs"]
mod tests;
