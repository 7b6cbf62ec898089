//! Scheduler snippets for running `quickshield check` periodically from cron or systemd.
//!
//! quickshield keeps no state between runs, so repetition is entirely the OS scheduler's job.
//! This module only renders text; it never runs checks.

use std::path::Path;

use strum::{Display, EnumIter};

use crate::core::models::{CheckKind, ReportFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, clap::ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum Preset {
    #[value(name = "every-5m")]
    #[strum(serialize = "every-5m")]
    Every5m,
    #[value(name = "every-15m")]
    #[strum(serialize = "every-15m")]
    Every15m,
    Hourly,
    Daily,
    Weekly,
}

impl Preset {
    pub fn cron_expression(&self) -> &'static str {
        match self {
            Preset::Every5m => "*/5 * * * *",
            Preset::Every15m => "*/15 * * * *",
            Preset::Hourly => "0 * * * *",
            Preset::Daily => "0 6 * * *",
            Preset::Weekly => "0 6 * * 1",
        }
    }

    /// systemd `OnCalendar=` value.
    pub fn on_calendar(&self) -> &'static str {
        match self {
            Preset::Every5m => "*:0/5",
            Preset::Every15m => "*:0/15",
            Preset::Hourly => "hourly",
            Preset::Daily => "*-*-* 06:00:00",
            Preset::Weekly => "Mon *-*-* 06:00:00",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum SnippetStyle {
    #[default]
    Cron,
    Systemd,
}

/// Everything a snippet needs, already resolved by the CLI.
#[derive(Debug, Clone)]
pub struct ScheduleRequest<'a> {
    pub preset: Preset,
    pub style: SnippetStyle,
    /// Empty means all kinds; the `--only` flag is then left off.
    pub only: &'a [CheckKind],
    pub format: ReportFormat,
    pub config_path: &'a Path,
    pub working_dir: &'a Path,
}

/// The `quickshield check ...` invocation the scheduler should run, with the config path
/// quoted for the given style.
pub fn check_command(req: &ScheduleRequest<'_>) -> String {
    let path = req.config_path.display().to_string();
    let path = match req.style {
        SnippetStyle::Cron => shell_quote(&path),
        SnippetStyle::Systemd => systemd_quote(&path),
    };
    let mut cmd = format!("quickshield check --path {} --format {}", path, req.format);
    if !req.only.is_empty() {
        let kinds: Vec<String> = req.only.iter().map(|k| k.to_string()).collect();
        cmd.push_str(&format!(" --only {}", kinds.join(",")));
    }
    cmd
}

pub fn render(req: &ScheduleRequest<'_>) -> String {
    match req.style {
        SnippetStyle::Cron => render_cron(req),
        SnippetStyle::Systemd => render_systemd(req),
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c)
}

/// POSIX single-quoting, left off when every character is safe unquoted.
fn shell_quote(raw: &str) -> String {
    if !raw.is_empty() && raw.chars().all(is_shell_safe) {
        return raw.to_string();
    }
    format!("'{}'", raw.replace('\'', "'\\''"))
}

/// Double-quoting for an `ExecStart=` argument. `%` and `$` are doubled so systemd does not
/// expand them as specifiers or variables.
fn systemd_quote(raw: &str) -> String {
    let escaped = systemd_escape(raw);
    if !raw.is_empty() && raw.chars().all(is_shell_safe) {
        return escaped;
    }
    format!(
        "\"{}\"",
        escaped.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

/// Single-path settings such as `WorkingDirectory=` take the rest of the line verbatim,
/// so only specifiers need escaping there.
fn systemd_escape(raw: &str) -> String {
    raw.replace('%', "%%").replace('$', "$$")
}

fn render_cron(req: &ScheduleRequest<'_>) -> String {
    let line = format!(
        "{expr} cd {dir} && {cmd}",
        expr = req.preset.cron_expression(),
        dir = shell_quote(&req.working_dir.display().to_string()),
        cmd = check_command(req),
    );
    // cron turns a bare `%` into a newline.
    format!(
        "# quickshield ({preset}) - add with `crontab -e`\n{line}\n",
        preset = req.preset,
        line = line.replace('%', "\\%"),
    )
}

fn render_systemd(req: &ScheduleRequest<'_>) -> String {
    format!(
        "# ~/.config/systemd/user/quickshield.service\n\
         [Unit]\n\
         Description=QuickShield site checks\n\
         \n\
         [Service]\n\
         Type=oneshot\n\
         WorkingDirectory={dir}\n\
         ExecStart={cmd}\n\
         \n\
         # ~/.config/systemd/user/quickshield.timer\n\
         [Unit]\n\
         Description=Run QuickShield ({preset})\n\
         \n\
         [Timer]\n\
         OnCalendar={calendar}\n\
         Persistent=true\n\
         \n\
         [Install]\n\
         WantedBy=timers.target\n\
         \n\
         # enable with: systemctl --user enable --now quickshield.timer\n",
        dir = systemd_escape(&req.working_dir.display().to_string()),
        cmd = check_command(req),
        preset = req.preset,
        calendar = req.preset.on_calendar(),
    )
}
