//! Flowpad node-graph flow editor
//!
//! Application shell: wires the canvas, palette, inspector, and
//! parameter windows to the store, and drives the execution session and
//! background I/O (catalog refresh, autosave, media uploads) from one
//! `update` loop.

use base64::Engine;
use chrono::{DateTime, Utc};
use eframe::egui;
use flowpad::api::{BackendClient, PayloadStore};
use flowpad::catalog::{self, Catalog};
use flowpad::constants::AUTOSAVE_INTERVAL_SECS;
use flowpad::data::{wire, MediaEncoding, MediaPayload, Value};
use flowpad::document::{self, FlowDocument};
use flowpad::error::FlowError;
use flowpad::graph::{NodeChange, NodeId, Path};
use flowpad::session::{ExecutionSession, SessionState};
use flowpad::store::FlowStore;
use flowpad::ui::canvas::Canvas;
use flowpad::ui::editors::{self, EditBuffers};
use flowpad::ui::{dispatch, ExpandContext, UiAction};
use std::collections::HashSet;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Results coming back from background threads.
enum BackgroundEvent {
    Catalog(Result<Catalog, FlowError>),
    Uploaded {
        path: Path,
        result: Result<Value, FlowError>,
    },
    Autosaved(Result<DateTime<Utc>, FlowError>),
}

struct FlowpadApp {
    store: FlowStore,
    catalog: Catalog,
    session: ExecutionSession,
    client: BackendClient,
    canvas: Canvas,
    buffers: EditBuffers,
    open_parameters: HashSet<NodeId>,
    background_tx: mpsc::Sender<BackgroundEvent>,
    background_rx: mpsc::Receiver<BackgroundEvent>,
    last_autosave: Instant,
    last_saved: Option<DateTime<Utc>>,
    autosave_in_flight: bool,
    quiet: bool,
    status_line: String,
}

impl FlowpadApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        egui_extras::install_image_loaders(&cc.egui_ctx);
        let (background_tx, background_rx) = mpsc::channel();
        let client = BackendClient::from_env();
        let app = Self {
            store: FlowStore::new(),
            catalog: Catalog::default(),
            session: ExecutionSession::new(),
            client,
            canvas: Canvas::default(),
            buffers: EditBuffers::new(),
            open_parameters: HashSet::new(),
            background_tx,
            background_rx,
            last_autosave: Instant::now(),
            last_saved: None,
            autosave_in_flight: false,
            quiet: false,
            status_line: String::new(),
        };
        app.refresh_catalog();
        app
    }

    fn refresh_catalog(&self) {
        let client = self.client.clone();
        let tx = self.background_tx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(BackgroundEvent::Catalog(client.fetch_catalog()));
        });
    }

    fn drain_background(&mut self) {
        while let Ok(event) = self.background_rx.try_recv() {
            match event {
                BackgroundEvent::Catalog(Ok(catalog)) => {
                    catalog::reconcile(&mut self.store.graph, &catalog);
                    self.catalog = catalog;
                    self.status_line = "catalog refreshed".to_string();
                }
                BackgroundEvent::Catalog(Err(err)) => {
                    log::error!("catalog refresh failed: {err}");
                    self.status_line = format!("catalog refresh failed: {err}");
                }
                BackgroundEvent::Uploaded { path, result } => match result {
                    Ok(value) => {
                        if let Err(err) = self.store.adopt_descriptor(&path, value) {
                            log::error!("upload result rejected at '{path}': {err}");
                        }
                    }
                    Err(err) => {
                        log::error!("upload failed for '{path}': {err}");
                        self.status_line = format!("upload failed: {err}");
                    }
                },
                BackgroundEvent::Autosaved(result) => {
                    self.autosave_in_flight = false;
                    match result {
                        Ok(at) => self.last_saved = Some(at),
                        Err(err) => log::warn!("autosave failed: {err}"),
                    }
                }
            }
        }
    }

    fn maybe_autosave(&mut self) {
        let due = self.last_autosave.elapsed() >= Duration::from_secs(AUTOSAVE_INTERVAL_SECS);
        if !due || self.autosave_in_flight || self.store.graph.is_empty() {
            return;
        }
        self.last_autosave = Instant::now();
        self.autosave_in_flight = true;
        let graph = self.store.graph.clone();
        let client = self.client.clone();
        let tx = self.background_tx.clone();
        std::thread::spawn(move || {
            let result =
                document::to_document(&graph, &client).and_then(|doc| client.autosave(&doc));
            let _ = tx.send(BackgroundEvent::Autosaved(result));
        });
    }

    fn apply_actions(&mut self, actions: Vec<UiAction>) {
        for action in actions {
            let result = match action {
                UiAction::Write { path, value } => self.store.set(&path, value),
                UiAction::SetMetadata { path, key, value } => {
                    self.store.set_metadata(&path, key, value)
                }
                UiAction::ToggleExpanded { path } => self.store.toggle_expanded(&path),
                UiAction::ToggleFieldExpanded {
                    node,
                    label,
                    context,
                } => {
                    if let Some(field) = self
                        .store
                        .graph
                        .nodes
                        .get_mut(&node)
                        .and_then(|n| n.field_mut(&label))
                    {
                        match context {
                            ExpandContext::Node => field.node_expanded = !field.node_expanded,
                            ExpandContext::Inspector => {
                                field.inspector_expanded = !field.inspector_expanded
                            }
                        }
                    }
                    Ok(())
                }
                UiAction::ClearValue { node, label } => {
                    if let Some(field) = self
                        .store
                        .graph
                        .nodes
                        .get_mut(&node)
                        .and_then(|n| n.field_mut(&label))
                    {
                        field.value = None;
                    }
                    Ok(())
                }
                UiAction::PickMedia { path } => {
                    self.pick_media(path);
                    Ok(())
                }
            };
            if let Err(err) = result {
                log::error!("edit rejected: {err}");
                self.status_line = format!("edit rejected: {err}");
            }
        }
    }

    /// Open a file picker and upload the chosen media file in the
    /// background; the field updates when the server descriptor arrives.
    fn pick_media(&mut self, path: Path) {
        let Some(file) = rfd::FileDialog::new()
            .add_filter("images", &["png", "jpg", "jpeg", "svg"])
            .pick_file()
        else {
            return;
        };
        let bytes = match std::fs::read(&file) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("could not read '{}': {err}", file.display());
                return;
            }
        };
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png")
            .to_lowercase();
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let value = Value::media(MediaPayload {
            encoding: MediaEncoding::from_str(&extension),
            data: Some(encoded),
            filename: Some(filename.clone()),
            ..MediaPayload::default()
        });
        let blob = wire::to_wire(&value).to_string();

        let client = self.client.clone();
        let tx = self.background_tx.clone();
        std::thread::spawn(move || {
            let result = client.upload(&blob, &filename, &extension);
            let _ = tx.send(BackgroundEvent::Uploaded { path, result });
        });
    }

    fn save_to_disk(&mut self) {
        let Some(target) = rfd::FileDialog::new()
            .add_filter("flow", &["json"])
            .save_file()
        else {
            return;
        };
        let document = match document::to_document(&self.store.graph, &self.client) {
            Ok(document) => document,
            Err(err) => {
                log::error!("save failed: {err}");
                self.status_line = format!("save failed: {err}");
                return;
            }
        };
        match serde_json::to_string_pretty(&document) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&target, json) {
                    log::error!("could not write '{}': {err}", target.display());
                    self.status_line = format!("save failed: {err}");
                } else {
                    self.store.graph.filename = target
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(String::from);
                    self.last_saved = Some(Utc::now());
                    self.status_line = format!("saved {}", target.display());
                }
            }
            Err(err) => log::error!("document did not serialize: {err}"),
        }
    }

    fn load_from_disk(&mut self) {
        let Some(source) = rfd::FileDialog::new()
            .add_filter("flow", &["json"])
            .pick_file()
        else {
            return;
        };
        let json = match std::fs::read_to_string(&source) {
            Ok(json) => json,
            Err(err) => {
                log::error!("could not read '{}': {err}", source.display());
                return;
            }
        };
        let parsed: FlowDocument = match serde_json::from_str(&json) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::error!("'{}' is not a flow document: {err}", source.display());
                self.status_line = format!("open failed: {err}");
                return;
            }
        };
        match document::from_document(parsed, &self.client) {
            Ok(graph) => {
                self.store = FlowStore::with_graph(graph);
                self.canvas = Canvas::default();
                self.buffers.clear();
                self.open_parameters.clear();
                self.status_line = format!("opened {}", source.display());
            }
            Err(err) => {
                log::error!("open failed: {err}");
                self.status_line = format!("open failed: {err}");
            }
        }
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("New").clicked() {
                    self.store = FlowStore::new();
                    self.canvas = Canvas::default();
                    self.buffers.clear();
                    self.open_parameters.clear();
                    ui.close_menu();
                }
                if ui.button("Open…").clicked() {
                    self.load_from_disk();
                    ui.close_menu();
                }
                if ui.button("Save As…").clicked() {
                    self.save_to_disk();
                    ui.close_menu();
                }
            });
            ui.separator();
            match self.session.state() {
                SessionState::Idle => {
                    let enabled = !self.store.graph.is_empty();
                    if ui
                        .add_enabled(enabled, egui::Button::new("▶ Run"))
                        .clicked()
                    {
                        self.session
                            .execute(&self.store, &self.client.execute_url(), self.quiet);
                    }
                }
                SessionState::Connecting => {
                    ui.add_enabled(false, egui::Button::new("connecting…"));
                }
                SessionState::Running => {
                    if ui.button("■ Cancel").clicked() {
                        self.session.cancel();
                    }
                }
                SessionState::Cancelling => {
                    ui.add_enabled(false, egui::Button::new("cancelling…"));
                }
            }
            ui.checkbox(&mut self.quiet, "quiet");
            ui.separator();
            if ui.button("⟳ Catalog").clicked() {
                self.refresh_catalog();
            }
        });
    }

    fn palette(&mut self, ui: &mut egui::Ui) {
        ui.heading("Nodes");
        let mut spawn = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (category, groups) in &self.catalog.groups {
                egui::CollapsingHeader::new(category)
                    .default_open(false)
                    .show(ui, |ui| {
                        for (group, templates) in groups {
                            ui.weak(group);
                            for template in templates {
                                let name = template
                                    .display_name
                                    .as_deref()
                                    .unwrap_or(&template.class_name);
                                if ui.button(name).clicked() {
                                    spawn = Some(template.clone());
                                }
                            }
                        }
                    });
            }
        });
        if let Some(template) = spawn {
            // drop near the current view center
            let viewport = self.store.graph.viewport;
            let position = egui::Pos2::new(200.0 - viewport.x, 150.0 - viewport.y);
            self.store
                .apply_node_change(NodeChange::Added(catalog::instantiate(&template, position)));
        }
    }

    fn inspector(&mut self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.heading("Inspector");
        let Some(id) = self.canvas.selected.clone() else {
            ui.weak("no node selected");
            return;
        };
        let Some(node) = self.store.graph.nodes.get(&id) else {
            return;
        };
        ui.label(&node.data.display_name);
        ui.weak(format!(
            "{}.{} · {:?}",
            node.data.namespace, node.data.class_name, node.data.status
        ));
        if node.data.streaming {
            ui.add(egui::ProgressBar::new(node.data.progress).show_percentage());
        }
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.strong("Inputs");
            for field in &node.data.inputs {
                dispatch::render_field(
                    ui,
                    &id,
                    field,
                    ExpandContext::Inspector,
                    &mut self.buffers,
                    actions,
                );
            }
            ui.strong("Outputs");
            for field in &node.data.outputs {
                dispatch::render_field(
                    ui,
                    &id,
                    field,
                    ExpandContext::Inspector,
                    &mut self.buffers,
                    actions,
                );
            }
            if !node.data.terminal_output.is_empty() {
                ui.separator();
                ui.strong("Output log");
                ui.monospace(&node.data.terminal_output);
            }
        });
    }

    fn parameter_windows(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        let open_ids: Vec<NodeId> = self.open_parameters.iter().cloned().collect();
        for id in open_ids {
            let Some(node) = self.store.graph.nodes.get(&id) else {
                self.open_parameters.remove(&id);
                continue;
            };
            let mut open = true;
            egui::Window::new(format!("{} parameters", node.data.display_name))
                .id(egui::Id::new(("parameters", &id)))
                .open(&mut open)
                .resizable(true)
                .show(ctx, |ui| {
                    for field in &node.data.inputs {
                        dispatch::render_field(
                            ui,
                            &id,
                            field,
                            ExpandContext::Node,
                            &mut self.buffers,
                            actions,
                        );
                    }
                });
            if !open {
                self.open_parameters.remove(&id);
            }
        }
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let state = match self.session.state() {
                SessionState::Idle => "idle",
                SessionState::Connecting => "connecting",
                SessionState::Running => "running",
                SessionState::Cancelling => "cancelling",
            };
            ui.label(format!("session: {state}"));
            ui.separator();
            if let Some(at) = self.session.last_synchronized() {
                ui.label(format!("synced {}", at.format("%H:%M:%S")));
                ui.separator();
            }
            if let Some(at) = self.last_saved {
                ui.label(format!("saved {}", at.format("%H:%M:%S")));
                ui.separator();
            }
            ui.label(self.client.base_url());
            if !self.status_line.is_empty() {
                ui.separator();
                ui.weak(&self.status_line);
            }
        });
    }
}

impl eframe::App for FlowpadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_background();
        self.session.poll(&mut self.store, &self.client);
        self.maybe_autosave();

        let mut actions = Vec::new();

        egui::TopBottomPanel::top("menu").show(ctx, |ui| self.top_bar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        egui::SidePanel::left("palette")
            .default_width(200.0)
            .show(ctx, |ui| self.palette(ui));
        egui::SidePanel::right("inspector")
            .default_width(280.0)
            .show(ctx, |ui| self.inspector(ui, &mut actions));

        egui::CentralPanel::default().show(ctx, |ui| {
            let output = self.canvas.show(ui, &self.store.graph);
            if let Some(viewport) = output.viewport {
                self.store.graph.viewport = viewport;
            }
            for change in output.node_changes {
                if let NodeChange::Removed(id) = &change {
                    editors::prune_node(&mut self.buffers, id);
                    self.open_parameters.remove(id);
                }
                self.store.apply_node_change(change);
            }
            for change in output.edge_changes {
                self.store.apply_edge_change(change);
            }
            if let Some(id) = output.open_parameters {
                self.open_parameters.insert(id);
            }
        });

        self.parameter_windows(ctx, &mut actions);
        self.apply_actions(actions);

        if self.session.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Flowpad",
        options,
        Box::new(|cc| Ok(Box::new(FlowpadApp::new(cc)))),
    )
}
