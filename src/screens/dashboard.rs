/// Main dashboard screen

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{Action, Popup};
use crate::core::{OutputEvent, VmState};
use crate::utils::truncate_string;

/// Everything the dashboard draws in one frame
pub struct DashboardView<'a> {
    pub actions: &'a [Action],
    pub selected_action: usize,
    pub vm_state: &'a VmState,
    pub developer: &'a str,
    pub output: &'a [OutputEvent],
    pub output_title: &'a str,
    /// Lines scrolled back from the bottom; 0 follows new output
    pub scroll_offset: usize,
    pub tailing: Option<&'a str>,
    pub status_message: Option<&'a str>,
    pub popup: Option<&'a Popup>,
    pub show_help: bool,
}

pub struct Dashboard {
    title: String,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

fn vm_state_color(state: &VmState) -> Color {
    match state {
        VmState::Running => Color::Green,
        VmState::PowerOff | VmState::Saved => Color::Yellow,
        VmState::Aborted => Color::Red,
        VmState::NotCreated | VmState::Other(_) | VmState::Unknown => Color::Gray,
    }
}

/// One output event cut to `width` columns, marked with "..." when cut
fn output_line(event: &OutputEvent, width: usize) -> Line<'static> {
    let (prefix, style) = match event {
        OutputEvent::Line(_) => ("", Style::default()),
        OutputEvent::Info(_) => ("• ", Style::default().fg(Color::Cyan)),
        OutputEvent::Command(_) => ("$ ", Style::default().fg(Color::DarkGray)),
        OutputEvent::Warning(_) => ("⚠ ", Style::default().fg(Color::Yellow)),
        OutputEvent::Success(_) => ("✓ ", Style::default().fg(Color::Green)),
        OutputEvent::Error(_) => ("✗ ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
    };
    let text = truncate_string(event.text(), width.saturating_sub(prefix.chars().count()));
    Line::from(vec![Span::styled(prefix, style), Span::styled(text, style)])
}

/// Window of `total` lines ending `offset` lines above the bottom
fn visible_range(total: usize, height: usize, offset: usize) -> (usize, usize) {
    // Scrolling past the top keeps the first page in view
    let offset = offset.min(total.saturating_sub(height));
    let end = total - offset;
    (end.saturating_sub(height), end)
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = area.width.min(width);
    let height = area.height.min(height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            title: format!("LGD Dev Environment v{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn render(&self, frame: &mut Frame, view: &DashboardView) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Min(0),    // Menu + output
                Constraint::Length(3), // Footer
            ])
            .split(frame.size());

        self.render_title(frame, chunks[0], view);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(30), Constraint::Min(0)])
            .split(chunks[1]);

        self.render_menu(frame, body[0], view);
        self.render_output(frame, body[1], view);
        self.render_footer(frame, chunks[2], view);

        if let Some(popup) = view.popup {
            self.render_popup(frame, popup);
        }

        if view.show_help {
            self.render_help(frame);
        }
    }

    fn render_title(&self, frame: &mut Frame, area: Rect, view: &DashboardView) {
        let title_line = Line::from(vec![
            Span::styled(
                &self.title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled("VM: ", Style::default().fg(Color::Gray)),
            Span::styled(
                view.vm_state.label(),
                Style::default()
                    .fg(vm_state_color(view.vm_state))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" | "),
            Span::styled("Developer: ", Style::default().fg(Color::Gray)),
            Span::styled(view.developer, Style::default().fg(Color::White)),
        ]);

        let title = Paragraph::new(title_line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, area);
    }

    fn render_menu(&self, frame: &mut Frame, area: Rect, view: &DashboardView) {
        let items: Vec<ListItem> = view
            .actions
            .iter()
            .map(|action| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("[{}] ", action.key()), Style::default().fg(Color::Yellow)),
                    Span::raw(action.title()),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(" Actions "))
            .highlight_style(
                Style::default()
                    .bg(Color::Blue)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            );

        let mut state = ListState::default();
        state.select(Some(view.selected_action));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_output(&self, frame: &mut Frame, area: Rect, view: &DashboardView) {
        let mut title = if view.output_title.is_empty() {
            " Output ".to_string()
        } else {
            format!(" Output: {} ", view.output_title)
        };
        if let Some(container) = view.tailing {
            title.push_str(&format!("[following {}] ", container));
        }
        if view.scroll_offset > 0 {
            title.push_str(&format!("[↑{}] ", view.scroll_offset));
        }

        let height = area.height.saturating_sub(2) as usize;
        let width = area.width.saturating_sub(2) as usize;
        let (start, end) = visible_range(view.output.len(), height, view.scroll_offset);
        let lines: Vec<Line> = view.output[start..end].iter().map(|e| output_line(e, width)).collect();

        let output = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(output, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect, view: &DashboardView) {
        let footer_text = match (view.status_message, view.popup) {
            (Some(status), _) => status.to_string(),
            (None, Some(Popup::Select { .. })) => "[↑↓] Select | [Enter] Choose | [Esc] Cancel".to_string(),
            (None, Some(Popup::Confirm { .. })) => "[y] Yes | [n] No".to_string(),
            (None, Some(Popup::ModuleName { .. })) => "Type module name | [Enter] Run | [Esc] Cancel".to_string(),
            (None, None) => {
                "[↑↓] Select | [Enter] Run | [key] Shortcut | [PgUp/PgDn] Scroll | [End] Follow | [?] Help | [q]uit"
                    .to_string()
            }
        };

        let footer = Paragraph::new(footer_text)
            .alignment(Alignment::Center)
            .style(if view.status_message.is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
            .block(Block::default().borders(Borders::ALL));

        frame.render_widget(footer, area);
    }

    fn render_popup(&self, frame: &mut Frame, popup: &Popup) {
        match popup {
            Popup::Select { list, selected } => {
                let height = (list.choices.len() as u16).saturating_add(2).min(20);
                let area = centered(frame.size(), 70, height);
                frame.render_widget(Clear, area);

                let items: Vec<ListItem> = list
                    .choices
                    .iter()
                    .map(|c| ListItem::new(truncate_string(&c.label, 64)))
                    .collect();
                let widget = List::new(items)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(format!(" {} ", list.title))
                            .border_style(Style::default().fg(Color::Cyan)),
                    )
                    .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
                    .highlight_symbol("> ");

                let mut state = ListState::default();
                state.select(Some(*selected));
                frame.render_stateful_widget(widget, area, &mut state);
            }
            Popup::Confirm { message, .. } => {
                let area = centered(frame.size(), 70, 7);
                frame.render_widget(Clear, area);

                let text = vec![
                    Line::from(""),
                    Line::from(Span::styled(message.as_str(), Style::default().fg(Color::White))),
                    Line::from(""),
                    Line::from(Span::styled(
                        "[y] Yes   [n] No",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )),
                ];
                let dialog = Paragraph::new(text)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(" Confirm ")
                            .border_style(Style::default().fg(Color::Red)),
                    );
                frame.render_widget(dialog, area);
            }
            Popup::ModuleName {
                action,
                container,
                buffer,
            } => {
                let area = centered(frame.size(), 60, 5);
                frame.render_widget(Clear, area);

                let text = vec![
                    Line::from(vec![
                        Span::styled("Module: ", Style::default().fg(Color::Gray)),
                        Span::styled(buffer.as_str(), Style::default().fg(Color::Yellow)),
                        Span::styled("█", Style::default().fg(Color::Yellow)),
                    ]),
                    Line::from(Span::styled(
                        format!("Container: {}", container),
                        Style::default().fg(Color::DarkGray),
                    )),
                ];
                let dialog = Paragraph::new(text).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!(" {} module ", action.verb()))
                        .border_style(Style::default().fg(Color::Cyan)),
                );
                frame.render_widget(dialog, area);
            }
        }
    }

    fn render_help(&self, frame: &mut Frame) {
        let area = centered(frame.size(), 70, 24);
        frame.render_widget(Clear, area);

        let heading = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let help_text = vec![
            Line::from(Span::styled(
                "LGD Dev Environment - Keyboard Shortcuts",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled("Navigation:", heading)),
            Line::from("  [↑ ↓] / [k j]  Select action"),
            Line::from("  [Enter]        Run selected action"),
            Line::from("  [letter]       Run the action with that shortcut"),
            Line::from(""),
            Line::from(Span::styled("Output:", heading)),
            Line::from("  [PgUp/PgDn]    Scroll output"),
            Line::from("  [Home]/[End]   Jump to top / follow new output"),
            Line::from("  [s]            Stop the running log tail"),
            Line::from(""),
            Line::from(Span::styled("Dialogs:", heading)),
            Line::from("  [↑ ↓] [Enter]  Pick an entry"),
            Line::from("  [y] / [n]      Confirm or cancel destructive actions"),
            Line::from("  [Esc]          Close dialog"),
            Line::from(""),
            Line::from(Span::styled("Global:", heading)),
            Line::from("  [?] / [F1]     Toggle this help"),
            Line::from("  [q] / [Esc]    Quit"),
        ];

        let help = Paragraph::new(help_text).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .border_style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(help, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{Choice, ChoiceList, PendingAction, SelectPurpose};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    fn view<'a>(output: &'a [OutputEvent], popup: Option<&'a Popup>) -> DashboardView<'a> {
        DashboardView {
            actions: Action::all(),
            selected_action: 0,
            vm_state: &VmState::Running,
            developer: "jdoe",
            output,
            output_title: "Databases",
            scroll_offset: 0,
            tailing: None,
            status_message: None,
            popup,
            show_help: false,
        }
    }

    #[test]
    fn test_visible_range() {
        assert_eq!(visible_range(100, 10, 0), (90, 100));
        assert_eq!(visible_range(100, 10, 5), (85, 95));
        assert_eq!(visible_range(5, 10, 0), (0, 5));
        assert_eq!(visible_range(5, 10, 50), (0, 5));
        assert_eq!(visible_range(100, 10, 100), (0, 10));
        assert_eq!(visible_range(100, 10, 95), (0, 10));
        assert_eq!(visible_range(0, 10, 3), (0, 0));
    }

    #[test]
    fn test_long_output_lines_are_marked_when_cut() {
        let long = "x".repeat(200);
        let line = output_line(&OutputEvent::Warning(long), 40);
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text.chars().count(), 40);
        assert!(text.starts_with("⚠ "));
        assert!(text.ends_with("..."));

        let short = output_line(&OutputEvent::Line("shop-local-jdoe".into()), 40);
        let text: String = short.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "shop-local-jdoe");
    }

    #[test]
    fn test_home_shows_first_page() {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        let output: Vec<OutputEvent> = (0..100).map(|i| OutputEvent::Line(format!("row-{:03}", i))).collect();
        let dashboard = Dashboard::new();
        let mut v = view(&output, None);
        v.scroll_offset = output.len();

        terminal.draw(|f| dashboard.render(f, &v)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("row-000"));
        assert!(!text.contains("row-099"));
    }

    #[test]
    fn test_renders_menu_state_and_output() {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        let output = vec![OutputEvent::Line("shop-local-jdoe".into())];
        let dashboard = Dashboard::new();

        terminal.draw(|f| dashboard.render(f, &view(&output, None))).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("Start VM"));
        assert!(text.contains("running"));
        assert!(text.contains("shop-local-jdoe"));
    }

    #[test]
    fn test_renders_popups() {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        let dashboard = Dashboard::new();

        let select = Popup::Select {
            list: ChoiceList {
                purpose: SelectPurpose::OpenProject,
                title: "Open project".into(),
                choices: vec![Choice {
                    label: "shop".into(),
                    value: "shop".into(),
                }],
            },
            selected: 0,
        };
        terminal.draw(|f| dashboard.render(f, &view(&[], Some(&select)))).unwrap();
        assert!(buffer_text(&terminal).contains("Open project"));

        let confirm = Popup::Confirm {
            message: "Drop it?".into(),
            action: PendingAction::DeleteDatabase("x".into()),
        };
        terminal.draw(|f| dashboard.render(f, &view(&[], Some(&confirm)))).unwrap();
        assert!(buffer_text(&terminal).contains("Drop it?"));
    }
}
