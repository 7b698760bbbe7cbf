//! Turns one line typed by the operator into control changes plus the
//! actions the session has to carry out.
//!
//! Keywords are matched by minimum prefix, so `sel aa` and `select aa` are
//! the same command. The interpreter never talks to the server or the
//! device; everything it wants done comes back as an [`Intent`].

use bitflags::bitflags;
use tracing::debug;

use crate::controls::{
    AmpScale, ArraySpec, Decorations, PlotFlags, PolSet, SpdControls, VisControls, VisPanel,
    MAX_WINDOWS,
};
use crate::cycles::CycleIndex;
use crate::error::{NspdError, Result};
use crate::geometry::{MAX_XPANELS, MAX_YPANELS};
use crate::protocol::ServerType;
use crate::spectrum::{AmpPhaseOptions, CycleData, Quantity};
use crate::utils::{format_mjd, minmatch, mjd_from_date_ut, parse_obs_date, parse_time_of_day};

bitflags! {
    /// Work queued for the session loop.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Actions: u16 {
        const REFRESH = 1 << 0;
        const QUIT = 1 << 1;
        const CHANGE_SURFACE = 1 << 2;
        const NEW_DATA = 1 << 3;
        const CYCLE_FWD = 1 << 4;
        const CYCLE_BACK = 1 << 5;
        const LIST_CYCLES = 1 << 6;
        const TIME_REQUEST = 1 << 7;
        const OMIT_OPTIONS = 1 << 8;
        const UNKNOWN = 1 << 9;
        const DUMP = 1 << 10;
    }
}

impl Actions {
    /// Actions that need the cycle list before they mean anything.
    pub const NAVIGATION: Actions = Actions::CYCLE_FWD
        .union(Actions::CYCLE_BACK)
        .union(Actions::LIST_CYCLES)
        .union(Actions::TIME_REQUEST);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotFamily {
    #[default]
    Spd,
    Vis,
}

/// Panel grid of the spectrum pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub nx: usize,
    pub ny: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Layout { nx: 5, ny: 5 }
    }
}

/// Everything a command may read or change.
pub struct CommandContext<'a> {
    pub family: &'a mut PlotFamily,
    pub spd: &'a mut SpdControls,
    pub vis: &'a mut VisControls,
    pub layout: &'a mut Layout,
    pub options: &'a mut Vec<AmpPhaseOptions>,
    pub cycle: Option<&'a CycleData>,
    pub cycle_list: &'a CycleIndex,
    pub server_type: ServerType,
    /// Reading a stand-alone file; there is no server to ask.
    pub file_mode: bool,
    /// MJD of the cycle on display.
    pub cmjd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intent {
    pub actions: Actions,
    pub mjd_request: Option<f64>,
    pub dump_file: Option<String>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quit,
    Select,
    Channel,
    XAxis,
    YKind(Quantity),
    Scale,
    Array,
    On,
    Off,
    Nxy,
    Forward,
    Backward,
    List,
    Get,
    Show,
    Hide,
    DelAvg,
    Dump,
    Help,
    Print,
    Plot,
    History,
    Sort,
    Vis,
    Spd,
}

/// Keyword, shortest accepted prefix, command. The first match wins.
const COMMANDS: &[(&str, usize, Command)] = &[
    ("quit", 4, Command::Quit),
    ("exit", 4, Command::Quit),
    ("select", 3, Command::Select),
    ("channel", 2, Command::Channel),
    ("x", 1, Command::XAxis),
    ("phase", 1, Command::YKind(Quantity::Phase)),
    ("amplitude", 1, Command::YKind(Quantity::Amplitude)),
    ("real", 1, Command::YKind(Quantity::Real)),
    ("imaginary", 1, Command::YKind(Quantity::Imaginary)),
    ("delay", 5, Command::YKind(Quantity::Delay)),
    ("scale", 3, Command::Scale),
    ("array", 3, Command::Array),
    ("on", 2, Command::On),
    ("off", 3, Command::Off),
    ("nxy", 3, Command::Nxy),
    ("forward", 4, Command::Forward),
    ("backward", 4, Command::Backward),
    ("list", 3, Command::List),
    ("get", 3, Command::Get),
    ("show", 3, Command::Show),
    ("hide", 3, Command::Hide),
    ("delavg", 5, Command::DelAvg),
    ("dump", 4, Command::Dump),
    ("help", 1, Command::Help),
    ("print", 2, Command::Print),
    ("plot", 2, Command::Plot),
    ("history", 4, Command::History),
    ("sort", 4, Command::Sort),
    ("vis", 3, Command::Vis),
    ("spd", 3, Command::Spd),
];

const HELP: &[&str] = &[
    "select <aa|bb|ab|ba|*> <f1 z2 ...>   choose pols and windows",
    "channel [label] [min max]            channel range (no args: reset)",
    "x                                    toggle channel / frequency axis",
    "amp | pha | real | imag | delay [min max]   y quantity and range",
    "scale log | lin                      amplitude scaling",
    "array <digits>                       antennas to show, e.g. array 1246",
    "on | off <acs ccs aa bb ab ba>       products drawn",
    "nxy <nx> <ny>                        panel grid",
    "forward | backward | list            step through cycles (simulator)",
    "get time [YYYY-MM-DD] HH:MM[:SS]     fetch the cycle nearest a time",
    "show | hide <tvch | av>              tvchannel markers, averaged data",
    "delavg [label] <n>                   channels averaged for delays",
    "dump [file]                          write the page to a file",
    "vis | spd                            time-series or spectrum pages",
    "plot <panel> ...                     time-series panels (amp pha del tsys ...)",
    "history <minutes> [start]            time-series span",
    "sort                                 toggle sorting baselines by length",
    "print                                describe the current cycle",
    "quit                                 leave",
];

fn lookup(token: &str) -> Option<Command> {
    COMMANDS
        .iter()
        .find(|(keyword, min, _)| minmatch(keyword, token, *min))
        .map(|(_, _, command)| *command)
}

fn parse_number<T: std::str::FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| NspdError::parse(format!("bad {} '{}'", what, token)))
}

/// Window slot named by `label`: the cycle's own window labels first, then
/// `f<n>` meaning slot `n - 1`.
pub fn window_slot(label: &str, cycle: Option<&CycleData>) -> Option<usize> {
    if let Some(cycle) = cycle {
        if let Some(w) = cycle
            .window_names()
            .iter()
            .position(|n| n.eq_ignore_ascii_case(label))
        {
            return Some(w);
        }
    }
    let lower = label.to_ascii_lowercase();
    let n: usize = lower.strip_prefix('f')?.parse().ok()?;
    (1..=MAX_WINDOWS).contains(&n).then(|| n - 1)
}

fn looks_like_window(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some('f' | 'F' | 'z' | 'Z')) && chars.all(|c| c.is_ascii_digit())
}

pub fn interpret(line: &str, ctx: &mut CommandContext) -> Intent {
    let cleaned = line.replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mut intent = Intent::default();
    let Some((&first, args)) = tokens.split_first() else {
        return intent;
    };
    let Some(command) = lookup(first) else {
        intent.actions |= Actions::UNKNOWN;
        intent.messages.push(format!("unknown command '{}', try help", first));
        return intent;
    };
    if let Err(e) = run(command, args, ctx, &mut intent) {
        intent.messages.push(e.to_string());
    }
    debug!("{:?} {:?} -> {:?}", command, args, intent.actions);
    intent
}

fn run(command: Command, args: &[&str], ctx: &mut CommandContext, intent: &mut Intent) -> Result<()> {
    match command {
        Command::Quit => intent.actions |= Actions::QUIT,
        Command::Select => select(args, ctx, intent)?,
        Command::Channel => channel(args, ctx, intent)?,
        Command::XAxis => {
            ctx.spd.toggle_x_axis();
            intent.actions |= Actions::REFRESH;
        }
        Command::YKind(quantity) => y_kind(quantity, args, ctx, intent)?,
        Command::Scale => {
            let which = args
                .first()
                .ok_or_else(|| NspdError::parse("scale needs log or lin"))?;
            let scale = if minmatch("logarithmic", which, 3) {
                AmpScale::Log
            } else if minmatch("linear", which, 3) {
                AmpScale::Linear
            } else {
                return Err(NspdError::parse(format!("unknown scale '{}'", which)));
            };
            ctx.spd.set_amp_scale(scale);
            intent.actions |= Actions::REFRESH;
        }
        Command::Array => {
            let spec = ArraySpec::from_digits(args.iter().copied());
            if spec.is_empty() {
                return Err(NspdError::parse("array needs antenna numbers 1-9"));
            }
            ctx.spd.array_spec = spec;
            ctx.vis.array_spec = spec;
            intent.actions |= Actions::REFRESH;
        }
        Command::On | Command::Off => {
            if args.is_empty() {
                return Err(NspdError::parse("on/off needs acs, ccs, aa, bb, ab or ba"));
            }
            let mut flags = PlotFlags::empty();
            for token in args {
                flags |= PlotFlags::from_keyword(token)
                    .ok_or_else(|| NspdError::parse(format!("unknown product '{}'", token)))?;
            }
            let on = command == Command::On;
            let changed = ctx.spd.set_flags(flags, on);
            ctx.vis.plot_flags.set(flags, on);
            if changed {
                intent.actions |= Actions::REFRESH;
            }
        }
        Command::Nxy => {
            let [nx, ny] = args else {
                return Err(NspdError::parse("nxy needs two numbers"));
            };
            let nx: usize = parse_number(nx, "panel count")?;
            let ny: usize = parse_number(ny, "panel count")?;
            if !(1..=MAX_XPANELS).contains(&nx) || !(1..=MAX_YPANELS).contains(&ny) {
                return Err(NspdError::out_of_range(format!(
                    "nxy must be within 1..{} by 1..{}",
                    MAX_XPANELS, MAX_YPANELS
                )));
            }
            *ctx.layout = Layout { nx, ny };
            intent.actions |= Actions::CHANGE_SURFACE;
        }
        Command::Forward => navigation(Actions::CYCLE_FWD, ctx, intent)?,
        Command::Backward => navigation(Actions::CYCLE_BACK, ctx, intent)?,
        Command::List => navigation(Actions::LIST_CYCLES, ctx, intent)?,
        Command::Get => get_time(args, ctx, intent)?,
        Command::Show | Command::Hide => {
            let target = args
                .first()
                .ok_or_else(|| NspdError::parse("show/hide needs tvchannels or averaged"))?;
            let decoration = if minmatch("tvchannels", target, 4) {
                Decorations::TVCHANNELS
            } else if minmatch("averaged", target, 2) {
                Decorations::AVERAGED
            } else {
                return Err(NspdError::parse(format!("cannot show or hide '{}'", target)));
            };
            ctx.spd.set_decoration(decoration, command == Command::Show);
            intent.actions |= Actions::REFRESH;
        }
        Command::DelAvg => delay_averaging(args, ctx, intent)?,
        Command::Dump => {
            intent.dump_file = args.first().map(|s| s.to_string());
            intent.actions |= Actions::DUMP;
        }
        Command::Help => intent.messages.extend(HELP.iter().map(|s| s.to_string())),
        Command::Print => match ctx.cycle {
            Some(cycle) => intent.messages.extend(describe_cycle(cycle)),
            None => intent.messages.push("no cycle loaded".to_string()),
        },
        Command::Plot => {
            let panels = args
                .iter()
                .map(|t| {
                    VisPanel::from_keyword(t)
                        .ok_or_else(|| NspdError::parse(format!("unknown panel '{}'", t)))
                })
                .collect::<Result<Vec<_>>>()?;
            ctx.vis.set_panels(panels)?;
            intent.actions |= Actions::CHANGE_SURFACE;
        }
        Command::History => {
            let length: f32 = parse_number(
                args.first()
                    .ok_or_else(|| NspdError::parse("history needs a length in minutes"))?,
                "history length",
            )?;
            let start = match args.get(1) {
                Some(t) => Some(parse_number::<f32>(t, "history start")?),
                None => None,
            };
            ctx.vis.set_history(length, start)?;
            intent.actions |= Actions::REFRESH;
        }
        Command::Sort => {
            ctx.vis.sort_baselines = !ctx.vis.sort_baselines;
            intent.messages.push(format!(
                "baseline sorting {}",
                if ctx.vis.sort_baselines { "on" } else { "off" }
            ));
            intent.actions |= Actions::REFRESH;
        }
        Command::Vis | Command::Spd => {
            *ctx.family = if command == Command::Vis {
                PlotFamily::Vis
            } else {
                PlotFamily::Spd
            };
            intent.actions |= Actions::CHANGE_SURFACE;
        }
    }
    Ok(())
}

fn select(args: &[&str], ctx: &mut CommandContext, intent: &mut Intent) -> Result<()> {
    let mut pols = PolSet::empty();
    let mut windows = Vec::new();
    for token in args {
        if let Some(p) = PolSet::from_keyword(token) {
            pols |= p;
        } else if looks_like_window(token) {
            let w = window_slot(token, ctx.cycle)
                .ok_or_else(|| NspdError::out_of_range(format!("window {} not found", token)))?;
            windows.push(w);
        } else {
            return Err(NspdError::parse(format!("cannot select '{}'", token)));
        }
    }
    if pols.is_empty() && windows.is_empty() {
        return Err(NspdError::parse("select needs pols or window labels"));
    }
    if !pols.is_empty() {
        ctx.spd.pols = pols;
        ctx.vis.pols = pols;
    }
    if !windows.is_empty() {
        ctx.spd.set_windows(&windows);
        let names = ctx.cycle.map(|c| c.window_names()).unwrap_or_default();
        ctx.vis.visbands = windows
            .iter()
            .map(|&w| names.get(w).cloned().unwrap_or_else(|| format!("f{}", w + 1)))
            .collect();
    }
    intent.actions |= Actions::REFRESH;
    Ok(())
}

fn channel(args: &[&str], ctx: &mut CommandContext, intent: &mut Intent) -> Result<()> {
    match args {
        [] => ctx.spd.clear_channel_ranges(),
        [min, max] => {
            let (a, b) = (parse_number(min, "channel")?, parse_number(max, "channel")?);
            for w in ctx.spd.shown_windows() {
                ctx.spd.set_channel_range(w, a, b)?;
            }
        }
        [label, min, max] => {
            let w = window_slot(label, ctx.cycle)
                .ok_or_else(|| NspdError::out_of_range(format!("window {} not found", label)))?;
            let (a, b) = (parse_number(min, "channel")?, parse_number(max, "channel")?);
            ctx.spd.set_channel_range(w, a, b)?;
        }
        _ => return Err(NspdError::parse("channel takes [label] min max")),
    }
    intent.actions |= Actions::REFRESH;
    Ok(())
}

fn y_kind(quantity: Quantity, args: &[&str], ctx: &mut CommandContext, intent: &mut Intent) -> Result<()> {
    let range = match args {
        [] => None,
        [min, max] => Some((parse_number(min, "limit")?, parse_number(max, "limit")?)),
        _ => return Err(NspdError::parse("give both a minimum and a maximum")),
    };
    match *ctx.family {
        PlotFamily::Spd => ctx.spd.set_y_kind(quantity, range),
        PlotFamily::Vis => {
            let panel = VisPanel::from_quantity(quantity).ok_or_else(|| {
                NspdError::out_of_range(format!(
                    "{} is not shown on time-series pages",
                    quantity.short_name()
                ))
            })?;
            ctx.vis.set_panel_limits(panel, range);
        }
    }
    intent.actions |= Actions::REFRESH;
    Ok(())
}

fn navigation(action: Actions, ctx: &mut CommandContext, intent: &mut Intent) -> Result<()> {
    if ctx.file_mode {
        return Err(NspdError::out_of_range("no server: only the loaded cycle is available"));
    }
    if ctx.server_type == ServerType::Correlator {
        return Err(NspdError::out_of_range(
            "cycle navigation needs a simulator server",
        ));
    }
    intent.actions |= action;
    Ok(())
}

fn get_time(args: &[&str], ctx: &mut CommandContext, intent: &mut Intent) -> Result<()> {
    let rest = match args.split_first() {
        Some((first, rest)) if minmatch("time", first, 1) => rest,
        _ => return Err(NspdError::parse("usage: get time [YYYY-MM-DD] HH:MM[:SS]")),
    };
    let (date, time) = match rest {
        [time] => (None, *time),
        [date, time] => (
            Some(parse_obs_date(date).ok_or_else(|| NspdError::parse(format!("bad date '{}'", date)))?),
            *time,
        ),
        _ => return Err(NspdError::parse("usage: get time [YYYY-MM-DD] HH:MM[:SS]")),
    };
    let seconds = parse_time_of_day(time).ok_or_else(|| NspdError::parse(format!("bad time '{}'", time)))?;
    let date = date
        .or_else(|| ctx.cycle_list.earliest_date())
        .or_else(|| ctx.cycle.and_then(|c| parse_obs_date(&c.header.obs_date)))
        .ok_or_else(|| NspdError::out_of_range("date unknown: give the date as well"))?;
    navigation(Actions::TIME_REQUEST, ctx, intent)?;
    intent.mjd_request = Some(mjd_from_date_ut(date, seconds));
    Ok(())
}

fn delay_averaging(args: &[&str], ctx: &mut CommandContext, intent: &mut Intent) -> Result<()> {
    let (label, count) = match args {
        [n] => (None, *n),
        [label, n] => (Some(*label), *n),
        _ => return Err(NspdError::parse("usage: delavg [label] <n>")),
    };
    let n: usize = parse_number(count, "channel count")?;
    if n < 1 {
        return Err(NspdError::out_of_range("delavg needs at least one channel"));
    }
    let cycle = ctx
        .cycle
        .ok_or_else(|| NspdError::out_of_range("no cycle loaded"))?;
    let windows: Vec<usize> = match label {
        Some(l) => vec![window_slot(l, Some(cycle))
            .ok_or_else(|| NspdError::out_of_range(format!("window {} not found", l)))?],
        None => (0..cycle.num_windows()).collect(),
    };
    let mut changed = 0;
    for w in windows {
        let Some(index) = cycle.windows.get(w).and_then(|b| b.first()).map(|b| b.options) else {
            continue;
        };
        if let Some(window) = ctx.options.get_mut(index).and_then(|o| o.window_mut(w)) {
            window.delay_averaging = n;
            changed += 1;
        }
    }
    if changed == 0 {
        return Err(NspdError::out_of_range("no processing options for that window"));
    }
    match (ctx.file_mode, ctx.cmjd) {
        (false, Some(mjd)) => {
            intent.actions |= Actions::TIME_REQUEST;
            intent.mjd_request = Some(mjd);
        }
        _ => intent.actions |= Actions::REFRESH,
    }
    Ok(())
}

fn describe_cycle(cycle: &CycleData) -> Vec<String> {
    let header = &cycle.header;
    let mut lines = Vec::new();
    let when = cycle
        .mjd()
        .map(format_mjd)
        .unwrap_or_else(|| header.obs_date.clone());
    lines.push(format!("{} ({}) at {}", header.source_name, header.obs_type, when));
    for (w, blocks) in cycle.windows.iter().enumerate() {
        let Some(first) = blocks.first() else {
            continue;
        };
        let pols: Vec<&str> = blocks.iter().map(|b| b.pol.label()).collect();
        lines.push(format!(
            "  {} slot {}: {} channels, pols {}",
            first.window_name,
            w + 1,
            first.nchannels(),
            pols.join(" ")
        ));
    }
    if let Some(first) = cycle.windows.iter().flatten().next() {
        let labels: Vec<String> = first.baselines.iter().map(|b| b.label()).collect();
        lines.push(format!("  baselines: {}", labels.join(" ")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{ChannelRange, XAxis};
    use crate::spectrum::{AmpPhaseBlock, Baseline, Pol, WindowOptions, C32};

    struct Fixture {
        family: PlotFamily,
        spd: SpdControls,
        vis: VisControls,
        layout: Layout,
        options: Vec<AmpPhaseOptions>,
        cycle: Option<CycleData>,
        list: CycleIndex,
        server_type: ServerType,
        file_mode: bool,
        cmjd: Option<f64>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                family: PlotFamily::Spd,
                spd: SpdControls::default(),
                vis: VisControls::default(),
                layout: Layout::default(),
                options: Vec::new(),
                cycle: None,
                list: CycleIndex::new(),
                server_type: ServerType::Simulator,
                file_mode: false,
                cmjd: None,
            }
        }

        fn with_cycle(mut self) -> Self {
            let block = |w: usize, name: &str, pol: Pol| {
                AmpPhaseBlock::from_raw(
                    w,
                    name,
                    pol,
                    0,
                    (0..8).map(|c| c as f32).collect(),
                    (0..8).map(|c| 2000.0 + c as f32).collect(),
                    vec![Baseline::new(1, 2)],
                    vec![vec![vec![C32::new(1.0, 0.0); 8]]],
                )
            };
            let mut cycle = CycleData {
                windows: vec![
                    vec![block(0, "f1", Pol::XX), block(0, "f1", Pol::YY)],
                    vec![block(1, "z2", Pol::XX)],
                ],
                ..CycleData::default()
            };
            cycle.header.obs_date = "2017-09-04".into();
            cycle.header.source_name = "1934-638".into();
            self.options = vec![AmpPhaseOptions {
                windows: vec![WindowOptions::default(), WindowOptions::default()],
                ..AmpPhaseOptions::default()
            }];
            self.cycle = Some(cycle);
            self.cmjd = Some(58000.0);
            self
        }

        fn run(&mut self, line: &str) -> Intent {
            let mut ctx = CommandContext {
                family: &mut self.family,
                spd: &mut self.spd,
                vis: &mut self.vis,
                layout: &mut self.layout,
                options: &mut self.options,
                cycle: self.cycle.as_ref(),
                cycle_list: &self.list,
                server_type: self.server_type,
                file_mode: self.file_mode,
                cmjd: self.cmjd,
            };
            interpret(line, &mut ctx)
        }
    }

    #[test]
    fn minimum_match_keywords() {
        assert_eq!(lookup("sel"), Some(Command::Select));
        assert_eq!(lookup("se"), None);
        assert_eq!(lookup("ch"), Some(Command::Channel));
        assert_eq!(lookup("x"), Some(Command::XAxis));
        assert_eq!(lookup("xy"), None);
        assert_eq!(lookup("d"), None);
        assert_eq!(lookup("delay"), Some(Command::YKind(Quantity::Delay)));
        assert_eq!(lookup("delav"), Some(Command::DelAvg));
        assert_eq!(lookup("a"), Some(Command::YKind(Quantity::Amplitude)));
        assert_eq!(lookup("arr"), Some(Command::Array));
        assert_eq!(lookup("QUIT"), Some(Command::Quit));
        assert_eq!(lookup("qui"), None);
    }

    #[test]
    fn x_twice_is_identity() {
        let mut f = Fixture::new();
        let before = f.spd.clone();
        assert_eq!(f.run("x").actions, Actions::REFRESH);
        assert_eq!(f.spd.x_axis, XAxis::Frequency);
        f.run("x");
        assert_eq!(f.spd, before);
    }

    #[test]
    fn show_then_hide_restores_decorations() {
        let mut f = Fixture::new();
        f.run("show tvch");
        assert!(f.spd.decorations.contains(Decorations::TVCHANNELS));
        f.run("hide tvchannels");
        assert_eq!(f.spd.decorations, Decorations::empty());
        f.run("show av");
        assert_eq!(f.spd.decorations, Decorations::AVERAGED);
    }

    #[test]
    fn channel_ranges_swap_and_reset() {
        let mut f = Fixture::new().with_cycle();
        f.spd.set_windows(&[0, 1]);
        f.run("channel 300, 100");
        assert_eq!(f.spd.channel_range[0], Some(ChannelRange { min: 100, max: 300 }));
        assert_eq!(f.spd.channel_range[1], Some(ChannelRange { min: 100, max: 300 }));
        f.run("channel z2 5 1");
        assert_eq!(f.spd.channel_range[1], Some(ChannelRange { min: 1, max: 5 }));
        f.run("channel");
        assert_eq!(f.spd, {
            let mut clean = SpdControls::default();
            clean.set_windows(&[0, 1]);
            clean
        });
    }

    #[test]
    fn select_parallel_pols_matches_star_minus_cross_pols() {
        let mut a = Fixture::new();
        let mut b = Fixture::new();
        a.run("select aa bb");
        b.run("select *");
        assert_eq!(a.spd.pols, b.spd.pols - PolSet::XY - PolSet::YX);
    }

    #[test]
    fn select_windows_by_label() {
        let mut f = Fixture::new().with_cycle();
        let intent = f.run("sel z2");
        assert_eq!(intent.actions, Actions::REFRESH);
        assert_eq!(f.spd.shown_windows(), vec![1]);
        assert_eq!(f.vis.visbands, vec!["z2".to_string()]);
        let intent = f.run("sel z9");
        assert_eq!(intent.actions, Actions::empty());
        assert_eq!(intent.messages, vec!["out of range: window z9 not found".to_string()]);
        assert_eq!(f.spd.shown_windows(), vec![1]);
    }

    #[test]
    fn y_kind_with_descending_range() {
        let mut f = Fixture::new();
        f.run("pha 90 -90");
        assert_eq!(f.spd.y_kind, Quantity::Phase);
        assert_eq!(f.spd.yaxis_range, Some((-90.0, 90.0)));
        f.run("amp");
        assert_eq!((f.spd.y_kind, f.spd.yaxis_range), (Quantity::Amplitude, None));
        let intent = f.run("amp 1");
        assert_eq!(intent.actions, Actions::empty());
        assert_eq!(intent.messages.len(), 1);
    }

    #[test]
    fn vis_y_kind_sets_panel_limits() {
        let mut f = Fixture::new();
        f.run("vis");
        assert_eq!(f.family, PlotFamily::Vis);
        f.run("amp 10 0");
        assert_eq!(f.vis.panel_limits.get(&VisPanel::Amplitude), Some(&(0.0, 10.0)));
        assert_eq!(f.spd.yaxis_range, None);
        f.run("amp");
        assert!(f.vis.panel_limits.is_empty());
        assert!(!f.run("real").messages.is_empty());
    }

    #[test]
    fn on_off_refreshes_only_on_change() {
        let mut f = Fixture::new();
        assert_eq!(f.run("on acs").actions, Actions::empty());
        assert_eq!(f.run("off acs, aa").actions, Actions::REFRESH);
        assert!(!f.spd.plot_flags.contains(PlotFlags::AUTOS));
        assert!(!f.vis.plot_flags.contains(PlotFlags::XX));
        assert!(!f.run("on xyz").messages.is_empty());
    }

    #[test]
    fn nxy_is_bounded() {
        let mut f = Fixture::new();
        assert_eq!(f.run("nxy 3 2").actions, Actions::CHANGE_SURFACE);
        assert_eq!(f.layout, Layout { nx: 3, ny: 2 });
        assert_eq!(f.run("nxy 11 1").actions, Actions::empty());
        assert_eq!(f.run("nxy 0 1").actions, Actions::empty());
        assert_eq!(f.layout, Layout { nx: 3, ny: 2 });
    }

    #[test]
    fn navigation_needs_a_simulator() {
        let mut f = Fixture::new();
        assert_eq!(f.run("forw").actions, Actions::CYCLE_FWD);
        assert_eq!(f.run("back").actions, Actions::CYCLE_BACK);
        assert_eq!(f.run("list").actions, Actions::LIST_CYCLES);
        f.server_type = ServerType::Correlator;
        assert_eq!(f.run("forward").actions, Actions::empty());
        f.server_type = ServerType::Unknown;
        assert_eq!(f.run("forward").actions, Actions::CYCLE_FWD);
        f.file_mode = true;
        let intent = f.run("forward");
        assert_eq!(intent.actions, Actions::empty());
        assert_eq!(intent.messages.len(), 1);
    }

    #[test]
    fn get_time_uses_the_cycle_list_date() {
        let mut f = Fixture::new();
        f.list.set_range(864.0, 58000.0, 58000.02);
        f.list.set_times(vec![58000.0, 58000.01, 58000.02]);
        let intent = f.run("get time 00:14:24");
        assert_eq!(intent.actions, Actions::TIME_REQUEST);
        assert!((intent.mjd_request.unwrap() - 58000.01).abs() < 1e-9);

        let intent = f.run("get time 2017-09-05 12:00");
        assert!((intent.mjd_request.unwrap() - 58001.5).abs() < 1e-9);
    }

    #[test]
    fn get_time_without_any_date_is_an_error() {
        let mut f = Fixture::new();
        let intent = f.run("get time 01:00");
        assert_eq!(intent.actions, Actions::empty());
        assert!(intent.messages[0].contains("date unknown"));
        assert!(!f.run("get time 25:00").messages.is_empty());
    }

    #[test]
    fn delavg_updates_options_and_refetches() {
        let mut f = Fixture::new().with_cycle();
        let intent = f.run("delavg z2 4");
        assert_eq!(intent.actions, Actions::TIME_REQUEST);
        assert_eq!(intent.mjd_request, Some(58000.0));
        assert_eq!(f.options[0].windows[1].delay_averaging, 4);
        assert_eq!(f.options[0].windows[0].delay_averaging, 1);

        f.run("delavg 2");
        assert!(f.options[0].windows.iter().all(|w| w.delay_averaging == 2));

        f.file_mode = true;
        assert_eq!(f.run("delavg 3").actions, Actions::REFRESH);
        assert!(!f.run("delavg 0").messages.is_empty());
    }

    #[test]
    fn dump_takes_an_optional_file() {
        let mut f = Fixture::new();
        let intent = f.run("dump");
        assert_eq!((intent.actions, intent.dump_file), (Actions::DUMP, None));
        let intent = f.run("dump page.png");
        assert_eq!(intent.dump_file.as_deref(), Some("page.png"));
    }

    #[test]
    fn vis_commands() {
        let mut f = Fixture::new();
        assert_eq!(f.run("plot amp pha tsys temp").actions, Actions::CHANGE_SURFACE);
        assert_eq!(
            f.vis.panels,
            vec![VisPanel::Amplitude, VisPanel::Phase, VisPanel::Tsys, VisPanel::Temperature]
        );
        assert!(!f.run("plot amp bogus").messages.is_empty());
        assert_eq!(f.vis.num_panels(), 4);
        let intent = f.run("plot amp pha del tsys ctsys gtp sdo caljy temp pres humi");
        assert_eq!(intent.actions, Actions::empty());
        assert!(intent.messages[0].contains("11 panels"));
        assert_eq!(f.vis.num_panels(), 4);
        f.run("history 30 60");
        assert_eq!((f.vis.history_length, f.vis.history_start), (30.0, 60.0));
        f.run("sort");
        assert!(!f.vis.sort_baselines);
    }

    #[test]
    fn unknown_and_empty_lines() {
        let mut f = Fixture::new();
        let intent = f.run("frobnicate");
        assert_eq!(intent.actions, Actions::UNKNOWN);
        assert_eq!(f.run("   ").actions, Actions::empty());
        assert_eq!(f.run("exit").actions, Actions::QUIT);
    }

    #[test]
    fn print_describes_the_cycle() {
        let mut f = Fixture::new();
        assert_eq!(f.run("print").messages, vec!["no cycle loaded".to_string()]);
        let mut f = Fixture::new().with_cycle();
        let messages = f.run("pr").messages;
        assert!(messages[0].starts_with("1934-638"));
        assert!(messages.iter().any(|m| m.contains("z2 slot 2: 8 channels, pols AA")));
        assert!(messages.iter().any(|m| m == "  baselines: 12"));
    }
}
