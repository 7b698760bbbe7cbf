//! The session controller: owns every piece of state, merges what the
//! operator types and what the server sends into one action mask, and works
//! through that mask after each event.
//!
//! Nothing here blocks. The binary waits for input and hands each line or
//! response to [`Session::handle_line`] or [`Session::handle_response`].

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::command::{interpret, Actions, CommandContext, Layout, PlotFamily};
use crate::controls::{SpdControls, VisControls};
use crate::cycles::{CycleIndex, Step, VisCycle, VisHistory};
use crate::device::{dump_target, open_device, DeviceSpec, DeviceType, PlotDevice};
use crate::error::Result;
use crate::geometry::PanelGeometry;
use crate::network::RequestSink;
use crate::protocol::{Request, Response, ServerType};
use crate::read::read_cycle_file;
use crate::spd::{info_lines, render_spd, SpdPage};
use crate::spectrum::{AmpPhaseOptions, CycleData};
use crate::syscal::compile_tsys;
use crate::utils::format_mjd;
use crate::vis::{render_vis, VisPage};

/// Windows listed in the Tsys table of the info strip.
pub const MAX_TSYS_IFS: usize = 4;

/// Everything the command line decides.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub device: DeviceSpec,
    pub dump_type: DeviceType,
    /// Stand-alone cycle to show instead of talking to a server.
    pub file: Option<PathBuf>,
    pub server: Option<String>,
    pub port: u16,
    pub username: String,
    pub start_in_vis: bool,
    /// Minutes.
    pub history_length: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            device: DeviceSpec::Null,
            dump_type: DeviceType::Png,
            file: None,
            server: None,
            port: 8880,
            username: "nspd".to_string(),
            start_in_vis: false,
            history_length: 20.0,
        }
    }
}

/// Where a spectrum fetch has got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    /// `SpectrumMjd` sent; the server is loading the cycle.
    WaitingLoaded,
    /// `MjdSpectrum` sent; the cycle itself is on its way.
    RequestingMjd,
}

pub type DeviceOpener = fn(&DeviceSpec) -> Result<Box<dyn PlotDevice>>;

#[derive(Debug, Clone, Copy)]
struct Grid {
    nx: usize,
    ny: usize,
    abut: bool,
    margin_reduction: f32,
    info_lines: usize,
}

/// Borrowed view of what a page is drawn from.
struct Pages<'a> {
    family: PlotFamily,
    cycle: Option<&'a CycleData>,
    options: &'a [AmpPhaseOptions],
    spd: &'a SpdControls,
    vis: &'a VisControls,
    history: &'a VisHistory,
    cmjd: Option<f64>,
}

impl Pages<'_> {
    fn draw(&self, device: &mut dyn PlotDevice, geometry: &PanelGeometry) -> Result<usize> {
        let Some(cycle) = self.cycle else {
            debug!("nothing loaded yet");
            return Ok(0);
        };
        match self.family {
            PlotFamily::Spd => {
                let controls = self.spd.reconcile(cycle);
                let tsys = compile_tsys(&cycle.syscal, cycle.num_windows());
                let page = SpdPage {
                    cycle,
                    options: self.options,
                    controls: &controls,
                    tsys: &tsys,
                    max_tsys_ifs: MAX_TSYS_IFS,
                };
                render_spd(device, geometry, &page)
            }
            PlotFamily::Vis => {
                let controls = self.vis.reconcile(cycle);
                let times: Vec<f64> = self.cmjd.into_iter().collect();
                let page = VisPage {
                    history: self.history.cycles(),
                    controls: &controls,
                    times: &times,
                };
                render_vis(device, geometry, &page)
            }
        }
    }
}

pub struct Session<S: RequestSink> {
    config: SessionConfig,
    device: Box<dyn PlotDevice>,
    open_dump: DeviceOpener,
    geometry: PanelGeometry,
    family: PlotFamily,
    spd: SpdControls,
    vis: VisControls,
    layout: Layout,
    cycle: Option<CycleData>,
    options: Vec<AmpPhaseOptions>,
    cycle_list: CycleIndex,
    history: VisHistory,
    actions: Actions,
    pending: Actions,
    mjd_request: Option<f64>,
    dump_file: Option<String>,
    cmjd: Option<f64>,
    fetch: FetchState,
    server_type: ServerType,
    link: Option<S>,
    messages: Vec<String>,
    panels_drawn: usize,
}

impl<S: RequestSink> Session<S> {
    pub fn new(config: SessionConfig, device: Box<dyn PlotDevice>, link: Option<S>) -> Self {
        let family = if config.start_in_vis {
            PlotFamily::Vis
        } else {
            PlotFamily::Spd
        };
        let mut vis = VisControls::default();
        if vis.set_history(config.history_length, None).is_err() {
            warn!(
                "history length {} ignored, keeping {} minutes",
                config.history_length, vis.history_length
            );
        }
        Session {
            config,
            device,
            open_dump: open_device,
            geometry: PanelGeometry::new(),
            family,
            spd: SpdControls::default(),
            vis,
            layout: Layout::default(),
            cycle: None,
            options: Vec::new(),
            cycle_list: CycleIndex::new(),
            history: VisHistory::new(),
            actions: Actions::empty(),
            pending: Actions::empty(),
            mjd_request: None,
            dump_file: None,
            cmjd: None,
            fetch: FetchState::Idle,
            server_type: ServerType::Unknown,
            link,
            messages: Vec::new(),
            panels_drawn: 0,
        }
    }

    /// Replaces how dump devices are opened.
    pub fn with_dump_opener(mut self, opener: DeviceOpener) -> Self {
        self.open_dump = opener;
        self
    }

    /// Loads the stand-alone file or greets the server, then draws the
    /// empty page.
    pub fn start(&mut self) -> Result<()> {
        if let Some(path) = self.config.file.clone() {
            let (options, cycle) = read_cycle_file(&path)?;
            self.accept_data(options, cycle);
        } else {
            self.send(&Request::ServerType)?;
        }
        self.actions |= Actions::CHANGE_SURFACE;
        self.process_actions()
    }

    fn file_mode(&self) -> bool {
        self.config.file.is_some()
    }

    pub fn prompt(&self) -> &'static str {
        match self.family {
            PlotFamily::Spd => "NSPD> ",
            PlotFamily::Vis => "NVIS> ",
        }
    }

    pub fn should_quit(&self) -> bool {
        self.actions.contains(Actions::QUIT)
    }

    pub fn take_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    pub fn link(&self) -> Option<&S> {
        self.link.as_ref()
    }

    pub fn link_mut(&mut self) -> Option<&mut S> {
        self.link.as_mut()
    }

    pub fn fetch_state(&self) -> FetchState {
        self.fetch
    }

    pub fn current_mjd(&self) -> Option<f64> {
        self.cmjd
    }

    /// Panels on the screen after the last refresh.
    pub fn panels_drawn(&self) -> usize {
        self.panels_drawn
    }

    /// Writes out and releases the screen device.
    pub fn close(&mut self) -> Result<()> {
        self.device.close()
    }

    fn message(&mut self, text: impl Into<String>) {
        let text = text.into();
        debug!("message: {}", text);
        self.messages.push(text);
    }

    fn send(&mut self, request: &Request) -> Result<()> {
        match self.link.as_mut() {
            Some(link) => link.send(request),
            None => {
                debug!("no server, {} not sent", request.name());
                Ok(())
            }
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Result<()> {
        let intent = {
            let mut ctx = CommandContext {
                family: &mut self.family,
                spd: &mut self.spd,
                vis: &mut self.vis,
                layout: &mut self.layout,
                options: &mut self.options,
                cycle: self.cycle.as_ref(),
                cycle_list: &self.cycle_list,
                server_type: self.server_type,
                file_mode: self.config.file.is_some(),
                cmjd: self.cmjd,
            };
            interpret(line, &mut ctx)
        };
        self.messages.extend(intent.messages);
        if intent.mjd_request.is_some() {
            self.mjd_request = intent.mjd_request;
        }
        if intent.dump_file.is_some() {
            self.dump_file = intent.dump_file;
        }
        self.actions |= intent.actions;
        self.process_actions()
    }

    pub fn handle_response(&mut self, response: Response) -> Result<()> {
        debug!("handling {} in {:?}", response.name(), self.fetch);
        match response {
            Response::ServerType(server_type) => {
                info!("server is a {:?}", server_type);
                self.server_type = server_type;
                self.send(&Request::CurrentSpectrum)?;
                if server_type == ServerType::Simulator {
                    self.send(&Request::TimeRange)?;
                    self.send(&Request::CycleTimes)?;
                }
            }
            Response::CurrentSpectrum { options, cycle } => {
                if self.fetch == FetchState::Idle {
                    self.accept_data(options, *cycle);
                } else {
                    debug!("current spectrum ignored while a fetch is in flight");
                }
            }
            Response::LoadedSpectrum { options, cycle } => {
                self.fetch = FetchState::Idle;
                self.accept_data(options, *cycle);
            }
            Response::SpectrumOutsideRange => {
                self.fetch = FetchState::Idle;
                self.message("the requested time is outside the range the server holds");
            }
            Response::SpectrumLoaded => {
                if self.fetch == FetchState::WaitingLoaded {
                    self.fetch = FetchState::RequestingMjd;
                    self.send(&Request::MjdSpectrum)?;
                } else {
                    debug!("unexpected spectrum-loaded notice ignored");
                }
            }
            Response::TimeRange {
                cycletime,
                earliest,
                latest,
            } => {
                info!(
                    "server holds {} to {} every {} s",
                    format_mjd(earliest),
                    format_mjd(latest),
                    cycletime
                );
                self.cycle_list.set_range(cycletime, earliest, latest);
            }
            Response::CycleTimes(mjds) => {
                info!("{} cycles available", mjds.len());
                self.cycle_list.set_times(mjds);
            }
            Response::UserRequestVisData | Response::UsernameExists => match self.cmjd {
                Some(mjd) => {
                    self.mjd_request = Some(mjd);
                    self.actions |= Actions::TIME_REQUEST | Actions::OMIT_OPTIONS;
                }
                None => debug!("peer request ignored, nothing on display"),
            },
            Response::Shutdown => {
                info!("server is shutting down");
                self.message("server shut down");
                self.actions |= Actions::QUIT;
            }
        }
        self.process_actions()
    }

    fn accept_data(&mut self, options: Vec<AmpPhaseOptions>, cycle: CycleData) {
        self.options = options;
        self.cycle = Some(cycle);
        self.actions |= Actions::NEW_DATA;
    }

    /// Works through the action mask in a fixed order.
    pub fn process_actions(&mut self) -> Result<()> {
        if self.actions.contains(Actions::NEW_DATA) {
            self.actions.remove(Actions::NEW_DATA);
            self.take_new_data();
            self.actions |= Actions::CHANGE_SURFACE;
        }
        if self.actions.contains(Actions::CHANGE_SURFACE) {
            self.actions.remove(Actions::CHANGE_SURFACE);
            if let Err(e) = self.rebuild_geometry() {
                warn!("panel grid not rebuilt: {}", e);
                self.message(e.to_string());
            }
            self.actions |= Actions::REFRESH;
        }
        if self.actions.contains(Actions::DUMP) {
            self.actions.remove(Actions::DUMP);
            self.dump();
        }
        if self.actions.contains(Actions::REFRESH) {
            self.actions.remove(Actions::REFRESH);
            self.refresh();
        }
        if !self.pending.is_empty() && self.navigation_ready() {
            debug!("applying deferred {:?}", self.pending);
            self.actions |= self.pending;
            self.pending = Actions::empty();
        }
        self.navigate()?;
        self.actions.remove(Actions::UNKNOWN);
        Ok(())
    }

    fn take_new_data(&mut self) {
        let Some(cycle) = self.cycle.as_ref() else {
            return;
        };
        self.cmjd = cycle.mjd();
        match VisCycle::from_cycle(cycle, &self.options) {
            Some(reduced) => {
                self.history.push(reduced);
                let keep = self.vis.history_start.max(self.vis.history_length) as f64;
                self.history.trim(keep);
            }
            None => warn!("cycle without a usable date, not added to the history"),
        }
        info!(
            "new cycle {} at {}",
            cycle.header.source_name,
            self.cmjd.map(format_mjd).unwrap_or_else(|| "unknown time".into())
        );
    }

    fn grid(&self) -> Grid {
        match self.family {
            PlotFamily::Spd => Grid {
                nx: self.layout.nx,
                ny: self.layout.ny,
                abut: false,
                margin_reduction: 1.5,
                info_lines: info_lines(
                    self.cycle.as_ref().map(|c| c.num_windows()).unwrap_or(1),
                    MAX_TSYS_IFS,
                ),
            },
            PlotFamily::Vis => Grid {
                nx: 1,
                ny: self.vis.num_panels().max(1),
                abut: true,
                margin_reduction: 1.0,
                info_lines: 0,
            },
        }
    }

    fn rebuild_geometry(&mut self) -> Result<()> {
        let g = self.grid();
        debug!("panel grid {}x{}", g.nx, g.ny);
        self.geometry.split(
            g.nx,
            g.ny,
            self.device.as_ref(),
            g.abut,
            g.margin_reduction,
            g.info_lines,
        )
    }

    fn pages(&self) -> Pages<'_> {
        Pages {
            family: self.family,
            cycle: self.cycle.as_ref(),
            options: &self.options,
            spd: &self.spd,
            vis: &self.vis,
            history: &self.history,
            cmjd: self.cmjd,
        }
    }

    /// Redraws the screen. A failed render leaves the controls alone.
    fn refresh(&mut self) {
        let pages = Pages {
            family: self.family,
            cycle: self.cycle.as_ref(),
            options: &self.options,
            spd: &self.spd,
            vis: &self.vis,
            history: &self.history,
            cmjd: self.cmjd,
        };
        let result = pages
            .draw(self.device.as_mut(), &self.geometry)
            .and_then(|drawn| self.device.flush().map(|_| drawn));
        match result {
            Ok(drawn) => self.panels_drawn = drawn,
            Err(e) => {
                warn!("render failed: {}", e);
                self.message(format!("cannot draw: {}", e));
            }
        }
    }

    /// Draws the current page on a device of its own; the screen device is
    /// not touched.
    fn dump(&mut self) {
        let spec = dump_target(self.dump_file.take().as_deref(), self.config.dump_type, Utc::now());
        match self.dump_to(&spec) {
            Ok(()) => {
                info!("dumped page to {}", spec);
                let shown = spec
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| spec.to_string());
                self.message(format!("plot written to {}", shown));
            }
            Err(e) => {
                warn!("dump to {} failed: {}", spec, e);
                self.message(format!("cannot dump to {}: {}", spec, e));
            }
        }
    }

    fn dump_to(&self, spec: &DeviceSpec) -> Result<()> {
        let mut device = (self.open_dump)(spec)?;
        let mut geometry = PanelGeometry::new();
        let g = self.grid();
        let drawn = geometry
            .split(g.nx, g.ny, device.as_ref(), g.abut, g.margin_reduction, g.info_lines)
            .and_then(|_| self.pages().draw(device.as_mut(), &geometry));
        let closed = device.close();
        drawn?;
        closed
    }

    /// Navigation only makes sense once the cycle list is in, except on a
    /// correlator, which has no list and takes times as given.
    fn navigation_ready(&self) -> bool {
        self.file_mode() || self.cycle_list.is_known() || self.server_type == ServerType::Correlator
    }

    fn navigate(&mut self) -> Result<()> {
        let nav = self.actions & Actions::NAVIGATION;
        if nav.is_empty() {
            self.actions.remove(Actions::OMIT_OPTIONS);
            return Ok(());
        }
        let carried = nav | (self.actions & Actions::OMIT_OPTIONS);
        self.actions.remove(carried);
        if !self.navigation_ready() {
            debug!("cycle list not known yet, deferring {:?}", carried);
            self.pending |= carried;
            return Ok(());
        }
        let omit_options = carried.contains(Actions::OMIT_OPTIONS);

        if nav.contains(Actions::LIST_CYCLES) {
            if self.cycle_list.is_known() {
                let listing = self.cycle_list.listing();
                self.messages.extend(listing);
            } else {
                self.message("the server has no cycle list");
            }
        }

        let target = if nav.contains(Actions::TIME_REQUEST) {
            self.time_target()
        } else if nav.contains(Actions::CYCLE_FWD) {
            self.step_target(self.cycle_list.step_forward(self.cmjd), "last")
        } else if nav.contains(Actions::CYCLE_BACK) {
            self.step_target(self.cycle_list.step_backward(self.cmjd), "first")
        } else {
            None
        };
        match target {
            Some(mjd) => self.request_mjd(mjd, omit_options),
            None => Ok(()),
        }
    }

    fn time_target(&mut self) -> Option<f64> {
        let mjd = self.mjd_request.take()?;
        if !self.cycle_list.is_known() {
            return Some(mjd);
        }
        if !self.cycle_list.in_range(mjd) {
            self.message(format!(
                "{} is outside the cycles held, {} to {}",
                format_mjd(mjd),
                format_mjd(self.cycle_list.earliest_mjd),
                format_mjd(self.cycle_list.latest_mjd)
            ));
            return None;
        }
        match self.cycle_list.nearest_within(mjd) {
            Some(found) => Some(found),
            None => {
                self.message(format!("no cycle near {}", format_mjd(mjd)));
                None
            }
        }
    }

    fn step_target(&mut self, step: Option<Step>, end: &str) -> Option<f64> {
        match step {
            Some(Step::To(mjd)) => Some(mjd),
            Some(Step::Clamped) => {
                self.message(format!("already at the {} cycle", end));
                None
            }
            None => {
                self.message("no cycles available");
                None
            }
        }
    }

    fn request_mjd(&mut self, mjd: f64, omit_options: bool) -> Result<()> {
        if self.file_mode() {
            self.message("no server: only the loaded cycle is available");
            return Ok(());
        }
        let options = if omit_options {
            Vec::new()
        } else {
            self.options.clone()
        };
        info!(
            "requesting cycle at {}{}",
            format_mjd(mjd),
            if omit_options { " with the server's options" } else { "" }
        );
        self.fetch = FetchState::WaitingLoaded;
        self.send(&Request::SpectrumMjd { mjd, options })
    }
}
