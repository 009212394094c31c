//! Static HTML report: the ranked clears and the per-level difficulty table.
//!
//! The page is self-contained. Column headers sort on click (numeric columns
//! sort on the `data-value` attribute) and a lamp selector hides rows.

use std::path::Path;

use anyhow::{Context, Result};

use crate::clear::Lamp;
use crate::pipeline::Outcome;
use crate::rank::{ChartRow, Recommendation};

const STYLE: &str = r#"
body { font-family: sans-serif; background-color: #222; color: #eee; padding: 20px; }
h1, h2 { font-weight: normal; }
.summary td { border: none; padding: 4px 16px 4px 0; }
.tab { overflow: hidden; border: 1px solid #444; background-color: #333; border-radius: 5px 5px 0 0; }
.tab button { background-color: inherit; float: left; border: none; outline: none;
  cursor: pointer; padding: 12px 14px; color: #ccc; font-weight: bold; }
.tab button:hover { background-color: #555; }
.tab button.active { background-color: #007bff; color: white; }
.tabcontent { display: none; padding: 6px 12px; border: 1px solid #444; border-top: none; }
table { width: 100%; border-collapse: collapse; margin-top: 10px; }
th, td { padding: 8px; border-bottom: 1px solid #444; text-align: left; }
th { background-color: #333; cursor: pointer; user-select: none; }
th:hover { background-color: #555; }
th::after { content: ' \21C5'; font-size: 0.8em; color: #888; }
.lamp-fc { color: #55ffff; font-weight: bold; }
.lamp-exhard { color: #ffdd55; font-weight: bold; }
.lamp-hard { color: #ff5555; font-weight: bold; }
.lamp-clear { color: #5599ff; font-weight: bold; }
.lamp-easy { color: #55ff55; font-weight: bold; }
.lamp-assist { color: #cc88ff; }
.lamp-failed { color: #aaaaaa; }
.lamp-noplay { color: #666666; }
.prob-high { color: #ffcc00; font-weight: bold; }
"#;

const SCRIPT: &str = r#"
function openTab(evt, id) {
  for (const el of document.getElementsByClassName("tabcontent")) el.style.display = "none";
  for (const el of document.getElementsByClassName("tablinks")) el.classList.remove("active");
  document.getElementById(id).style.display = "block";
  evt.currentTarget.classList.add("active");
}
function sortTable(id, col, type) {
  const table = document.getElementById(id);
  const body = table.tBodies[0];
  const rows = Array.from(body.rows);
  const dir = table.dataset.sortCol == col && table.dataset.sortDir == "asc" ? "desc" : "asc";
  rows.sort((a, b) => {
    let x = a.cells[col].dataset.value, y = b.cells[col].dataset.value;
    if (type === "number") { x = parseFloat(x); y = parseFloat(y); }
    else { x = x.toLowerCase(); y = y.toLowerCase(); }
    const c = x < y ? -1 : x > y ? 1 : 0;
    return dir === "asc" ? c : -c;
  });
  rows.forEach(r => body.appendChild(r));
  table.dataset.sortCol = col;
  table.dataset.sortDir = dir;
}
function filterLamp(value) {
  for (const row of document.querySelectorAll("tr[data-lamp]")) {
    row.style.display = value === "" || row.dataset.lamp === value ? "" : "none";
  }
}
"#;

const ALL_LAMPS: [Lamp; 9] = [
    Lamp::NoPlay,
    Lamp::Failed,
    Lamp::Assist,
    Lamp::LightAssist,
    Lamp::Easy,
    Lamp::Clear,
    Lamp::Hard,
    Lamp::ExHard,
    Lamp::FullCombo,
];

/// Which sections to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sections {
    /// Summary, ranked clears and the difficulty table.
    Full,
    /// Summary and the difficulty table only.
    TableOnly,
}

/// Write the report to `path` in one go.
pub fn write_report(path: &Path, outcome: &Outcome, sections: Sections) -> Result<()> {
    let html = render_report(outcome, sections, &timestamp());
    std::fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote report to {}", path.display());
    Ok(())
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

/// Render the full page.
pub fn render_report(outcome: &Outcome, sections: Sections, generated_at: &str) -> String {
    let mut html = String::with_capacity(64 * 1024);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    html.push_str(&format!(
        "<title>{} practice report</title>\n",
        escape(&outcome.prefix)
    ));
    html.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));

    render_summary(&mut html, outcome, generated_at);
    render_lamp_filter(&mut html);
    if sections == Sections::Full {
        render_recommendations(&mut html, &outcome.prefix, &outcome.recommendations);
    }
    render_difficulty_tabs(&mut html, &outcome.charts);

    html.push_str(&format!("<script>{SCRIPT}</script>\n</body>\n</html>\n"));
    html
}

/// The next whole display level above the estimate, the latent skill it
/// corresponds to, and how far the estimate is from it.
pub fn next_level_target(outcome: &Outcome) -> (f64, f64, f64) {
    let level = outcome.level.floor() + 1.0;
    let theta = outcome.calibration.level_to_latent(level);
    (level, theta, theta - outcome.estimate.theta)
}

fn render_summary(html: &mut String, outcome: &Outcome, generated_at: &str) {
    let prefix = escape(&outcome.prefix);
    let (next_level, next_theta, gap) = next_level_target(outcome);
    html.push_str(&format!(
        "<h1>Estimated level: {prefix}{:.2}</h1>\n",
        outcome.level
    ));
    html.push_str("<table class=\"summary\">\n");
    html.push_str(&format!(
        "<tr><td>Skill (latent)</td><td>{:.3}</td></tr>\n",
        outcome.estimate.theta
    ));
    html.push_str(&format!(
        "<tr><td>Next level ({prefix}{next_level:.0})</td><td>{next_theta:.3} (+{gap:.3})</td></tr>\n"
    ));
    html.push_str(&format!(
        "<tr><td>Performance rating</td><td>{:.1}</td></tr>\n",
        outcome.rating.decayed
    ));
    html.push_str(&format!(
        "<tr><td>Raw pp sum</td><td>{:.1}</td></tr>\n",
        outcome.rating.raw
    ));
    html.push_str(&format!(
        "<tr><td>Plays fitted</td><td>{}</td></tr>\n",
        outcome.estimate.observations
    ));
    html.push_str(&format!(
        "<tr><td>Generated</td><td>{}</td></tr>\n",
        escape(generated_at)
    ));
    html.push_str("</table>\n");
}

fn render_lamp_filter(html: &mut String) {
    html.push_str("<p>Lamp: <select onchange=\"filterLamp(this.value)\">\n");
    html.push_str("<option value=\"\">All</option>\n");
    for lamp in ALL_LAMPS {
        html.push_str(&format!(
            "<option value=\"{0}\">{0}</option>\n",
            lamp.label()
        ));
    }
    html.push_str("</select></p>\n");
}

fn render_recommendations(html: &mut String, prefix: &str, entries: &[Recommendation]) {
    html.push_str(&format!("<h2>Top {} clears</h2>\n", entries.len()));
    html.push_str("<table id=\"table-top\">\n<thead><tr>");
    for (col, (name, kind)) in [
        ("#", "number"),
        ("pp", "number"),
        ("Lamp", "text"),
        ("Level", "number"),
        ("Title", "text"),
    ]
    .iter()
    .enumerate()
    {
        html.push_str(&format!(
            "<th onclick=\"sortTable('table-top', {col}, '{kind}')\">{name}</th>"
        ));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    let prefix = escape(prefix);
    for (rank, entry) in entries.iter().enumerate() {
        let title = escape(&entry.title);
        html.push_str(&format!(
            "<tr data-lamp=\"{lamp}\"><td data-value=\"{n}\">{n}</td>\
             <td data-value=\"{pp}\">{pp:.0}</td>\
             <td data-value=\"{lamp}\" class=\"{class}\">{lamp}</td>\
             <td data-value=\"{level}\">{prefix}{level:.2}</td>\
             <td data-value=\"{title}\">{title}</td></tr>\n",
            n = rank + 1,
            pp = entry.pp,
            lamp = entry.lamp.label(),
            class = entry.lamp.css_class(),
            level = entry.level_value,
        ));
    }
    html.push_str("</tbody>\n</table>\n");
}

fn render_difficulty_tabs(html: &mut String, rows: &[ChartRow]) {
    let mut levels: Vec<(usize, &str)> = rows
        .iter()
        .map(|r| (r.level, r.display_level.as_str()))
        .collect();
    levels.sort_unstable();
    levels.dedup_by_key(|(level, _)| *level);

    html.push_str("<h2>Difficulty table</h2>\n<div class=\"tab\">\n");
    html.push_str(
        "<button class=\"tablinks active\" onclick=\"openTab(event, 'tab-all')\">ALL</button>\n",
    );
    for (level, label) in &levels {
        html.push_str(&format!(
            "<button class=\"tablinks\" onclick=\"openTab(event, 'tab-{level}')\">{}</button>\n",
            escape(label)
        ));
    }
    html.push_str("</div>\n");

    render_chart_table(html, "all", rows.iter(), true);
    for (level, _) in &levels {
        let id = level.to_string();
        render_chart_table(html, &id, rows.iter().filter(|r| r.level == *level), false);
    }
}

fn render_chart_table<'a>(
    html: &mut String,
    id: &str,
    rows: impl Iterator<Item = &'a ChartRow>,
    visible: bool,
) {
    let style = if visible { " style=\"display: block;\"" } else { "" };
    html.push_str(&format!(
        "<div id=\"tab-{id}\" class=\"tabcontent\"{style}>\n<table id=\"table-{id}\">\n<thead><tr>"
    ));
    for (col, (name, kind)) in [
        ("Title", "text"),
        ("Difficulty", "number"),
        ("Lamp", "text"),
        ("Min BP", "number"),
        ("Score rate", "number"),
        ("Next goal", "text"),
        ("Pass chance", "number"),
    ]
    .iter()
    .enumerate()
    {
        html.push_str(&format!(
            "<th onclick=\"sortTable('table-{id}', {col}, '{kind}')\">{name}</th>"
        ));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in rows {
        let title = escape(&row.title);
        let (bp_value, bp_text) = match row.min_bp {
            Some(bp) => (bp.to_string(), bp.to_string()),
            None => ("-1".to_string(), "-".to_string()),
        };
        let (rate_value, rate_text) = match row.score_rate {
            Some(rate) => (rate.to_string(), format!("{:.2}%", rate * 100.0)),
            None => ("-1".to_string(), "-".to_string()),
        };
        let goal = row.next_goal.map_or("", |g| g.label());
        let percent = row.pass_probability * 100.0;
        let prob_class = if percent >= 50.0 { "prob-high" } else { "" };

        html.push_str(&format!(
            "<tr data-lamp=\"{lamp}\"><td data-value=\"{title}\">{title}</td>\
             <td data-value=\"{difficulty}\">{level_label} ({difficulty:.2})</td>\
             <td data-value=\"{lamp_rank}\" class=\"{lamp_class}\">{lamp}</td>\
             <td data-value=\"{bp_value}\">{bp_text}</td>\
             <td data-value=\"{rate_value}\">{rate_text}</td>\
             <td data-value=\"{goal}\">{goal}</td>\
             <td data-value=\"{percent}\" class=\"{prob_class}\">{percent:.1}%</td></tr>\n",
            lamp = row.lamp.label(),
            difficulty = row.difficulty,
            level_label = escape(&row.display_level),
            lamp_rank = row.lamp as u8,
            lamp_class = row.lamp.css_class(),
        ));
    }
    html.push_str("</tbody>\n</table>\n</div>\n");
}

/// Escape text for use in element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
