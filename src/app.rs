/// Main TUI application

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::core::restore::RestoreRequest;
use crate::core::{ModuleAction, OutputEvent, OutputSink, VmState, Workspace};
use crate::screens::{Dashboard, DashboardView};

// Output buffer management
const MAX_OUTPUT_LINES: usize = 10_000;
const PAGE_SCROLL: usize = 10;
const VM_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    VmUp,
    VmHalt,
    RefreshStatus,
    MainLogs,
    ContainerLogs,
    StopTail,
    Ports,
    OpenProject,
    ListDatabases,
    DeleteDatabase,
    RestoreBackup,
    UpdateModule,
    InstallModule,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::VmUp,
            Action::VmHalt,
            Action::RefreshStatus,
            Action::MainLogs,
            Action::ContainerLogs,
            Action::StopTail,
            Action::Ports,
            Action::OpenProject,
            Action::ListDatabases,
            Action::DeleteDatabase,
            Action::RestoreBackup,
            Action::UpdateModule,
            Action::InstallModule,
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            Action::VmUp => "Start VM",
            Action::VmHalt => "Stop VM",
            Action::RefreshStatus => "Refresh VM status",
            Action::MainLogs => "Main container logs",
            Action::ContainerLogs => "Container logs...",
            Action::StopTail => "Stop log tail",
            Action::Ports => "Containers & ports",
            Action::OpenProject => "Open project...",
            Action::ListDatabases => "List databases",
            Action::DeleteDatabase => "Delete database...",
            Action::RestoreBackup => "Restore backup...",
            Action::UpdateModule => "Update module...",
            Action::InstallModule => "Install module...",
        }
    }

    pub fn key(&self) -> char {
        match self {
            Action::VmUp => 'u',
            Action::VmHalt => 'h',
            Action::RefreshStatus => 'r',
            Action::MainLogs => 'l',
            Action::ContainerLogs => 'c',
            Action::StopTail => 's',
            Action::Ports => 'p',
            Action::OpenProject => 'o',
            Action::ListDatabases => 'd',
            Action::DeleteDatabase => 'x',
            Action::RestoreBackup => 'b',
            Action::UpdateModule => 'm',
            Action::InstallModule => 'i',
        }
    }

    fn from_key(c: char) -> Option<Action> {
        Action::all().iter().copied().find(|a| a.key() == c)
    }
}

/// What a selector choice feeds into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectPurpose {
    OpenProject,
    FollowLogs,
    DeleteDatabase,
    RestoreProject,
    RestoreBackup { project: String },
    ModuleContainer(ModuleAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceList {
    pub purpose: SelectPurpose,
    pub title: String,
    pub choices: Vec<Choice>,
}

/// Destructive work waiting for a yes/no answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    DeleteDatabase(String),
    Restore(RestoreRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    Select { list: ChoiceList, selected: usize },
    Confirm { message: String, action: PendingAction },
    ModuleName { action: ModuleAction, container: String, buffer: String },
}

pub struct App {
    workspace: Workspace,
    dashboard: Dashboard,
    selected_action: usize,
    vm_state: VmState,

    // Output pane
    output: Vec<OutputEvent>,
    output_title: String,
    scroll_offset: usize,
    current_op: u64,
    next_op: u64,

    // Log tail
    tail_handle: Option<JoinHandle<()>>,
    tail_container: Option<String>,

    // A restore keeps the pane until it reports how far it got
    restore_handle: Option<JoinHandle<()>>,

    popup: Option<Popup>,
    show_help: bool,
    status_message: Option<String>,
    should_quit: bool,
    last_vm_refresh: Instant,

    // Channels from background tasks
    output_tx: UnboundedSender<(u64, OutputEvent)>,
    output_rx: UnboundedReceiver<(u64, OutputEvent)>,
    vm_state_tx: UnboundedSender<VmState>,
    vm_state_rx: UnboundedReceiver<VmState>,
    choices_tx: UnboundedSender<(u64, ChoiceList)>,
    choices_rx: UnboundedReceiver<(u64, ChoiceList)>,
}

impl App {
    pub fn new(workspace: Workspace) -> Self {
        let (output_tx, output_rx) = unbounded_channel();
        let (vm_state_tx, vm_state_rx) = unbounded_channel();
        let (choices_tx, choices_rx) = unbounded_channel();

        Self {
            workspace,
            dashboard: Dashboard::new(),
            selected_action: 0,
            vm_state: VmState::Unknown,
            output: Vec::new(),
            output_title: String::new(),
            scroll_offset: 0,
            current_op: 0,
            next_op: 0,
            tail_handle: None,
            tail_container: None,
            restore_handle: None,
            popup: None,
            show_help: false,
            status_message: None,
            should_quit: false,
            last_vm_refresh: Instant::now(),
            output_tx,
            output_rx,
            vm_state_tx,
            vm_state_rx,
            choices_tx,
            choices_rx,
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        tracing::info!(developer = self.workspace.developer(), "TUI started");
        self.refresh_vm_state();

        let result = self.run_loop(&mut terminal).await;

        self.stop_tail();

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            self.drain_channels();

            if self.last_vm_refresh.elapsed() >= VM_REFRESH_INTERVAL {
                self.refresh_vm_state();
            }

            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key_event) = event::read()? {
                    self.handle_key(key_event);
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Apply everything background tasks sent since the last frame
    fn drain_channels(&mut self) {
        while let Ok((op, event)) = self.output_rx.try_recv() {
            // Late output of a superseded operation
            if op == self.current_op {
                self.push_output(event);
            }
        }

        while let Ok(state) = self.vm_state_rx.try_recv() {
            self.vm_state = state;
        }

        while let Ok((op, list)) = self.choices_rx.try_recv() {
            if op == self.current_op {
                self.open_choices(list);
            }
        }
    }

    fn push_output(&mut self, event: OutputEvent) {
        self.output.push(event);
        if self.output.len() > MAX_OUTPUT_LINES {
            let excess = self.output.len() - MAX_OUTPUT_LINES;
            self.output.drain(0..excess);
        }
        // Keep the viewed lines still while scrolled back
        if self.scroll_offset > 0 {
            self.scroll_offset = (self.scroll_offset + 1).min(self.output.len());
        }
    }

    /// Start an operation that owns the output pane
    fn begin_operation(&mut self, title: impl Into<String>) -> OutputSink {
        self.stop_tail();
        self.next_op += 1;
        self.current_op = self.next_op;
        self.output.clear();
        self.scroll_offset = 0;
        self.output_title = title.into();
        tracing::debug!(op = self.current_op, title = %self.output_title, "operation started");
        OutputSink::new(self.current_op, self.output_tx.clone())
    }

    /// Sink appending to the current operation's output
    fn current_sink(&self) -> OutputSink {
        OutputSink::new(self.current_op, self.output_tx.clone())
    }

    /// Run `work` in the background; an error becomes an output line
    fn spawn_op<F, Fut>(&self, sink: OutputSink, work: F) -> JoinHandle<()>
    where
        F: FnOnce(Workspace, OutputSink) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let task = work(self.workspace.clone(), sink.clone());
        tokio::spawn(async move {
            if let Err(e) = task.await {
                tracing::error!(op = sink.op(), error = %e, "action failed");
                sink.error(format!("{:#}", e));
            }
        })
    }

    /// Query the VM state in the background
    fn refresh_vm_state(&mut self) {
        self.last_vm_refresh = Instant::now();
        let vagrant = self.workspace.vagrant().clone();
        let tx = self.vm_state_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(vagrant.status().await);
        });
    }

    fn stop_tail(&mut self) -> bool {
        self.tail_container = None;
        match self.tail_handle.take() {
            Some(handle) => {
                // Dropping the aborted future kills the `docker logs -f` child
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn start_tail(&mut self, container: String) {
        let sink = self.begin_operation(format!("Logs: {}", container));
        let tail = self.workspace.config().log_tail;
        let name = container.clone();

        let handle = self.spawn_op(sink, move |ws, sink| async move {
            let status = ws.docker().follow_logs(&name, tail, &sink).await?;
            sink.info(format!("Log stream ended ({})", status));
            Ok(())
        });

        self.tail_handle = Some(handle);
        self.tail_container = Some(container);
    }

    fn restore_running(&self) -> bool {
        self.restore_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn run_action(&mut self, action: Action) {
        tracing::debug!(?action, "action selected");

        let keeps_pane = matches!(action, Action::RefreshStatus | Action::StopTail);
        if !keeps_pane && self.restore_running() {
            self.set_status("Restore still running, wait for it to finish");
            return;
        }

        match action {
            Action::VmUp => {
                let sink = self.begin_operation("vagrant up");
                let tx = self.vm_state_tx.clone();
                self.spawn_op(sink, move |ws, sink| async move {
                    ws.vagrant().up(&sink).await?;
                    let _ = tx.send(ws.vagrant().status().await);
                    Ok(())
                });
            }
            Action::VmHalt => {
                let sink = self.begin_operation("vagrant halt");
                let tx = self.vm_state_tx.clone();
                self.spawn_op(sink, move |ws, sink| async move {
                    ws.vagrant().halt(&sink).await?;
                    let _ = tx.send(ws.vagrant().status().await);
                    Ok(())
                });
            }
            Action::RefreshStatus => {
                self.refresh_vm_state();
                self.set_status("Refreshing VM status...");
            }
            Action::MainLogs => {
                let container = self.workspace.config().main_container.clone();
                self.start_tail(container);
            }
            Action::ContainerLogs => {
                let sink = self.begin_operation("Container logs");
                self.spawn_container_choices(sink, SelectPurpose::FollowLogs, "Follow logs of");
            }
            Action::StopTail => {
                if self.stop_tail() {
                    self.current_sink().info("Log tail stopped");
                } else {
                    self.set_status("No log tail running");
                }
            }
            Action::Ports => {
                let sink = self.begin_operation("Containers & ports");
                let vm_ip = self.workspace.config().vm_ip.clone();
                self.spawn_op(sink, move |ws, sink| async move {
                    ws.docker().report_ports(&vm_ip, &sink).await?;
                    Ok(())
                });
            }
            Action::OpenProject => {
                let sink = self.begin_operation("Open project");
                self.offer_projects(sink, SelectPurpose::OpenProject, "Open project");
            }
            Action::ListDatabases => {
                let sink = self.begin_operation("Databases");
                self.spawn_op(sink, |ws, sink| async move {
                    let names = ws.databases().list().await?;
                    if names.is_empty() {
                        sink.warn("No databases found");
                    }
                    for name in names {
                        sink.line(format!("🗄️  {}", name));
                    }
                    Ok(())
                });
            }
            Action::DeleteDatabase => {
                let sink = self.begin_operation("Delete database");
                let op = sink.op();
                let tx = self.choices_tx.clone();
                self.spawn_op(sink, move |ws, _sink| async move {
                    let names = ws.databases().list().await?;
                    let _ = tx.send((
                        op,
                        ChoiceList {
                            purpose: SelectPurpose::DeleteDatabase,
                            title: "Delete database".to_string(),
                            choices: names.into_iter().map(Choice::plain).collect(),
                        },
                    ));
                    Ok(())
                });
            }
            Action::RestoreBackup => {
                let sink = self.begin_operation("Restore backup");
                self.offer_projects(sink, SelectPurpose::RestoreProject, "Restore into project");
            }
            Action::UpdateModule => {
                let sink = self.begin_operation("Update module");
                self.spawn_container_choices(sink, SelectPurpose::ModuleContainer(ModuleAction::Update), "Update module in");
            }
            Action::InstallModule => {
                let sink = self.begin_operation("Install module");
                self.spawn_container_choices(sink, SelectPurpose::ModuleContainer(ModuleAction::Install), "Install module in");
            }
        }
    }

    fn spawn_container_choices(&self, sink: OutputSink, purpose: SelectPurpose, title: &str) {
        let op = sink.op();
        let tx = self.choices_tx.clone();
        let title = title.to_string();
        self.spawn_op(sink, move |ws, _sink| async move {
            let containers = ws.docker().list_containers().await?;
            let choices = containers
                .into_iter()
                .map(|c| Choice {
                    label: format!("{} ({})", c.name, c.image),
                    value: c.name,
                })
                .collect();
            let _ = tx.send((op, ChoiceList { purpose, title, choices }));
            Ok(())
        });
    }

    /// Project listing is local, so the selector opens right away
    fn offer_projects(&mut self, sink: OutputSink, purpose: SelectPurpose, title: &str) {
        match self.workspace.projects() {
            Ok(projects) => self.open_choices(ChoiceList {
                purpose,
                title: title.to_string(),
                choices: projects.into_iter().map(Choice::plain).collect(),
            }),
            Err(e) => sink.error(format!("{:#}", e)),
        }
    }

    fn open_choices(&mut self, list: ChoiceList) {
        if list.choices.is_empty() {
            self.current_sink().warn(format!("{}: nothing to choose from", list.title));
            return;
        }
        self.popup = Some(Popup::Select { list, selected: 0 });
    }

    fn on_choice(&mut self, purpose: SelectPurpose, choice: Choice) {
        match purpose {
            SelectPurpose::OpenProject => {
                let sink = self.current_sink();
                sink.info(format!("📂 Project selected: {}", choice.value));
                match self.workspace.open_project(&choice.value) {
                    Ok(path) => {
                        sink.success(format!("Task file written: {}", path.display()));
                        sink.success(format!("Opened in {}", self.workspace.config().editor));
                    }
                    Err(e) => sink.error(format!("{:#}", e)),
                }
            }
            SelectPurpose::FollowLogs => self.start_tail(choice.value),
            SelectPurpose::DeleteDatabase => {
                self.popup = Some(Popup::Confirm {
                    message: format!("Stop container and drop database '{}'?", choice.value),
                    action: PendingAction::DeleteDatabase(choice.value),
                });
            }
            SelectPurpose::RestoreProject => match self.workspace.backups() {
                Ok(backups) => self.open_choices(ChoiceList {
                    purpose: SelectPurpose::RestoreBackup { project: choice.value },
                    title: "Backup to restore".to_string(),
                    choices: backups
                        .iter()
                        .map(|b| Choice {
                            label: b.display_name(),
                            value: b.path.to_string_lossy().to_string(),
                        })
                        .collect(),
                }),
                Err(e) => self.current_sink().error(format!("{:#}", e)),
            },
            SelectPurpose::RestoreBackup { project } => {
                let name = self.workspace.environment_name(&project);
                self.popup = Some(Popup::Confirm {
                    message: format!("Replace database '{}' with {}?", name, choice.label),
                    action: PendingAction::Restore(RestoreRequest {
                        project,
                        archive: PathBuf::from(choice.value),
                    }),
                });
            }
            SelectPurpose::ModuleContainer(action) => {
                self.popup = Some(Popup::ModuleName {
                    action,
                    container: choice.value,
                    buffer: String::new(),
                });
            }
        }
    }

    fn on_confirmed(&mut self, action: PendingAction) {
        match action {
            PendingAction::DeleteDatabase(name) => {
                let sink = self.begin_operation(format!("Delete {}", name));
                self.spawn_op(sink, move |ws, sink| async move {
                    ws.databases().delete(&name, &sink).await?;
                    Ok(())
                });
            }
            PendingAction::Restore(request) => {
                let sink = self.begin_operation(format!("Restore {}", request.project));
                let handle = self.spawn_op(sink, move |ws, sink| async move {
                    ws.require_project(&request.project)?;
                    // The sequence prints the failure and its completed steps itself
                    if let Err(failure) = ws.restore_sequence(false).run(&request, &sink).await {
                        tracing::debug!(
                            environment = %failure.report.environment,
                            completed = failure.report.completed().len(),
                            "restore failure reported in the output pane"
                        );
                    }
                    Ok(())
                });
                self.restore_handle = Some(handle);
            }
        }
    }

    fn run_module_action(&mut self, action: ModuleAction, container: String, module: String) {
        let sink = self.begin_operation(format!("{} {}", action.verb(), module));
        self.spawn_op(sink, move |ws, sink| async move {
            ws.docker().run_module_action(action, &container, &module, &sink).await?;
            Ok(())
        });
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.popup.is_some() {
            self.handle_popup_key(key.code);
            return;
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::F(1) | KeyCode::Esc | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return;
        }

        self.clear_status();

        let actions = Action::all();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('?') | KeyCode::F(1) => {
                self.show_help = true;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_action = self.selected_action.checked_sub(1).unwrap_or(actions.len() - 1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_action = (self.selected_action + 1) % actions.len();
            }
            KeyCode::Enter => {
                self.run_action(actions[self.selected_action]);
            }
            KeyCode::PageUp => {
                self.scroll_offset = (self.scroll_offset + PAGE_SCROLL).min(self.output.len());
            }
            KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(PAGE_SCROLL);
            }
            KeyCode::Home => {
                self.scroll_offset = self.output.len();
            }
            KeyCode::End => {
                self.scroll_offset = 0;
            }
            KeyCode::Char(c) => {
                if let Some(action) = Action::from_key(c) {
                    if let Some(index) = actions.iter().position(|a| *a == action) {
                        self.selected_action = index;
                    }
                    self.run_action(action);
                }
            }
            _ => {}
        }
    }

    fn handle_popup_key(&mut self, key: KeyCode) {
        let Some(popup) = self.popup.take() else {
            return;
        };

        match popup {
            Popup::Select { list, selected } => match key {
                KeyCode::Up => {
                    let selected = selected.checked_sub(1).unwrap_or(list.choices.len() - 1);
                    self.popup = Some(Popup::Select { list, selected });
                }
                KeyCode::Down => {
                    let selected = (selected + 1) % list.choices.len();
                    self.popup = Some(Popup::Select { list, selected });
                }
                KeyCode::Enter => {
                    let choice = list.choices[selected].clone();
                    self.on_choice(list.purpose, choice);
                }
                KeyCode::Esc => self.set_status("Cancelled"),
                _ => self.popup = Some(Popup::Select { list, selected }),
            },
            Popup::Confirm { message, action } => match key {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.on_confirmed(action),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.set_status("Cancelled"),
                _ => self.popup = Some(Popup::Confirm { message, action }),
            },
            Popup::ModuleName {
                action,
                container,
                mut buffer,
            } => match key {
                KeyCode::Enter => {
                    let module = buffer.trim().to_string();
                    if module.is_empty() {
                        self.set_status("Module name required");
                        self.popup = Some(Popup::ModuleName { action, container, buffer });
                    } else {
                        self.run_module_action(action, container, module);
                    }
                }
                KeyCode::Esc => self.set_status("Cancelled"),
                KeyCode::Backspace => {
                    buffer.pop();
                    self.popup = Some(Popup::ModuleName { action, container, buffer });
                }
                KeyCode::Char(c) => {
                    buffer.push(c);
                    self.popup = Some(Popup::ModuleName { action, container, buffer });
                }
                _ => self.popup = Some(Popup::ModuleName { action, container, buffer }),
            },
        }
    }

    fn render(&self, frame: &mut ratatui::Frame) {
        let view = DashboardView {
            actions: Action::all(),
            selected_action: self.selected_action,
            vm_state: &self.vm_state,
            developer: self.workspace.developer(),
            output: &self.output,
            output_title: &self.output_title,
            scroll_offset: self.scroll_offset,
            tailing: self.tail_container.as_deref(),
            status_message: self.status_message.as_deref(),
            popup: self.popup.as_ref(),
            show_help: self.show_help,
        };
        self.dashboard.render(frame, &view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shell::testing::RecordingShell;
    use crate::core::backup::fixtures::write_zip;
    use crate::core::shell::{CommandOutput, CommandStatus, Invocation, Shell};
    use crate::utils::AppConfig;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn app_with(shell: Arc<dyn Shell>, dir: &TempDir) -> App {
        let mut config = AppConfig::default();
        config.dev_dir = dir.path().join("dev");
        config.backup_dir = Some(dir.path().to_path_buf());
        App::new(Workspace::new(config, shell))
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[tokio::test]
    async fn test_late_output_of_superseded_operation_is_dropped() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Arc::new(RecordingShell::new()), &dir);

        let first = app.begin_operation("first");
        let second = app.begin_operation("second");
        first.line("old");
        second.line("new");
        app.drain_channels();

        assert_eq!(app.output, vec![OutputEvent::Line("new".into())]);
        assert_eq!(app.output_title, "second");
    }

    #[tokio::test]
    async fn test_stale_choices_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Arc::new(RecordingShell::new()), &dir);
        let list = ChoiceList {
            purpose: SelectPurpose::DeleteDatabase,
            title: "Delete database".into(),
            choices: vec![Choice::plain("shop-local-jdoe")],
        };

        let old_op = app.begin_operation("a").op();
        app.begin_operation("b");
        app.choices_tx.send((old_op, list.clone())).unwrap();
        app.drain_channels();
        assert!(app.popup.is_none());

        app.choices_tx.send((app.current_op, list)).unwrap();
        app.drain_channels();
        assert!(matches!(app.popup, Some(Popup::Select { selected: 0, .. })));
    }

    #[tokio::test]
    async fn test_output_buffer_is_bounded() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(Arc::new(RecordingShell::new()), &dir);
        for i in 0..MAX_OUTPUT_LINES + 5 {
            app.push_output(OutputEvent::Line(i.to_string()));
        }
        assert_eq!(app.output.len(), MAX_OUTPUT_LINES);
        assert_eq!(app.output[0], OutputEvent::Line("5".into()));
    }

    #[tokio::test]
    async fn test_declined_delete_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let shell = Arc::new(RecordingShell::new());
        let mut app = app_with(shell.clone(), &dir);

        app.on_choice(SelectPurpose::DeleteDatabase, Choice::plain("shop-local-jdoe"));
        assert!(matches!(app.popup, Some(Popup::Confirm { .. })));

        press(&mut app, KeyCode::Char('x'));
        assert!(app.popup.is_some());

        press(&mut app, KeyCode::Char('n'));
        assert!(app.popup.is_none());
        assert!(shell.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restore_flow_asks_before_touching_the_vm() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dev/shop")).unwrap();
        fs::write(dir.path().join("prod.zip"), "").unwrap();
        let shell = Arc::new(RecordingShell::new());
        let mut app = app_with(shell.clone(), &dir);

        press(&mut app, KeyCode::Char('b'));
        match &app.popup {
            Some(Popup::Select { list, .. }) => {
                assert_eq!(list.purpose, SelectPurpose::RestoreProject);
                assert_eq!(list.choices, vec![Choice::plain("shop")]);
            }
            other => panic!("expected project selector, got {:?}", other),
        }

        press(&mut app, KeyCode::Enter);
        match &app.popup {
            Some(Popup::Select { list, .. }) => {
                assert_eq!(list.purpose, SelectPurpose::RestoreBackup { project: "shop".into() });
                assert!(list.choices[0].label.ends_with(" - prod.zip"));
            }
            other => panic!("expected backup selector, got {:?}", other),
        }

        press(&mut app, KeyCode::Enter);
        let expected = app.workspace.environment_name("shop").to_string();
        match &app.popup {
            Some(Popup::Confirm { message, action }) => {
                assert!(message.contains(&expected));
                assert!(matches!(action, PendingAction::Restore(r) if r.project == "shop"));
            }
            other => panic!("expected confirmation, got {:?}", other),
        }
        assert!(shell.calls().is_empty());

        press(&mut app, KeyCode::Esc);
        assert!(app.popup.is_none());
        assert_eq!(app.status_message.as_deref(), Some("Cancelled"));
    }

    #[tokio::test]
    async fn test_module_name_required() {
        let dir = TempDir::new().unwrap();
        let shell = Arc::new(RecordingShell::new());
        let mut app = app_with(shell.clone(), &dir);

        app.on_choice(SelectPurpose::ModuleContainer(ModuleAction::Update), Choice::plain("web"));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.status_message.as_deref(), Some("Module name required"));
        assert!(app.popup.is_some());

        for c in "sale".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Enter);
        assert!(app.popup.is_none());
        assert_eq!(app.output_title, "Updating sale");
    }

    fn output_contains(app: &App, needle: &str) -> bool {
        app.output.iter().any(|e| e.text().contains(needle))
    }

    #[tokio::test]
    async fn test_running_restore_keeps_the_pane_until_it_reports() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dev/shop")).unwrap();
        let archive = dir.path().join("nodump.zip");
        write_zip(&archive, &[("filestore/a.bin", "x")]);
        let shell = Arc::new(RecordingShell::new());
        let mut app = app_with(shell.clone(), &dir);

        app.on_confirmed(PendingAction::Restore(RestoreRequest {
            project: "shop".into(),
            archive,
        }));
        let restore_op = app.current_op;

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.current_op, restore_op);
        assert_eq!(
            app.status_message.as_deref(),
            Some("Restore still running, wait for it to finish")
        );

        for _ in 0..200 {
            app.drain_channels();
            if output_contains(&app, "Restore failed") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(output_contains(&app, "Restore failed"));
        assert!(output_contains(&app, "nothing was changed"));
        assert!(shell.calls().is_empty());

        if let Some(handle) = app.restore_handle.take() {
            handle.await.unwrap();
        }
        press(&mut app, KeyCode::Char('d'));
        assert_ne!(app.current_op, restore_op);
        assert_eq!(app.output_title, "Databases");
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Streams never finish, like `docker logs -f`
    #[derive(Default)]
    struct EndlessShell {
        started: Arc<AtomicUsize>,
        dropped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Shell for EndlessShell {
        async fn capture(&self, _invocation: &Invocation) -> Result<CommandOutput> {
            Ok(CommandOutput {
                status: CommandStatus::success(),
                text: String::new(),
            })
        }

        async fn stream(&self, _invocation: &Invocation, _sink: &OutputSink) -> Result<CommandStatus> {
            let _guard = DropCounter(self.dropped.clone());
            self.started.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
            Ok(CommandStatus::success())
        }
    }

    async fn wait_for(counter: &AtomicUsize, value: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) >= value {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("counter never reached {}", value);
    }

    #[tokio::test]
    async fn test_new_tail_cancels_previous_one() {
        let dir = TempDir::new().unwrap();
        let shell = Arc::new(EndlessShell::default());
        let mut app = app_with(shell.clone(), &dir);

        app.start_tail("first".into());
        wait_for(&shell.started, 1).await;

        app.start_tail("second".into());
        wait_for(&shell.dropped, 1).await;
        wait_for(&shell.started, 2).await;

        assert_eq!(shell.dropped.load(Ordering::SeqCst), 1);
        assert_eq!(app.tail_container.as_deref(), Some("second"));

        press(&mut app, KeyCode::Char('s'));
        wait_for(&shell.dropped, 2).await;
        assert!(app.tail_container.is_none());
    }
}
