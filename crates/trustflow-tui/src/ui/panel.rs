use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use trustflow_types::{
    CheckState, ImageReport, InspectionReport, Severity, VulnerabilityDetailState,
    VulnerabilityItem,
};

use crate::app::PanelView;
use crate::host::PanelRenderer;
use crate::ui::{
    Layout, Theme,
    components::{HelpOverlay, StatusBar, panel_hints},
};

/// Renders images, their checks and the vulnerability verdict of one resource
#[derive(Clone, Copy, Debug, Default)]
pub struct InspectionPanel;

impl PanelRenderer for InspectionPanel {
    fn render(&self, frame: &mut Frame, view: &PanelView<'_>) {
        let (header_area, content_area, status_area) = Layout::main(frame.area());
        let (main_area, details_area) = Layout::content(content_area, view.report.details.open);

        Self::render_header(frame, header_area, view);

        let body = Paragraph::new(summary_lines(view.report))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Theme::border()),
            )
            .wrap(Wrap { trim: false })
            .scroll((view.ui.scroll, 0));
        frame.render_widget(body, main_area);

        if let Some(area) = details_area {
            Self::render_details(frame, area, &view.report.details, view.ui.detail_scroll);
        }

        Self::render_status_bar(frame, status_area, view);

        if view.ui.show_help {
            HelpOverlay::render(frame);
        }
    }
}

impl InspectionPanel {
    fn render_header(frame: &mut Frame, area: Rect, view: &PanelView<'_>) {
        let report = view.report;
        let mut spans = vec![
            Span::styled(view.title.to_string(), Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(report.kind.clone(), Theme::text()),
            Span::styled(" ", Theme::text()),
            Span::styled(report.name.clone(), Theme::text_highlight()),
        ];
        if !report.namespace.is_empty() {
            spans.push(Span::styled(" │ ", Theme::text_dim()));
            spans.push(Span::styled(report.namespace.clone(), Theme::text()));
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );
        frame.render_widget(header, area);
    }

    fn render_details(
        frame: &mut Frame,
        area: Rect,
        details: &VulnerabilityDetailState,
        scroll: u16,
    ) {
        let title = match details.severity {
            Some(severity) => format!(" {} findings ", severity.label()),
            None => " Findings ".to_string(),
        };

        let widget = Paragraph::new(detail_lines(details))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Theme::border_focused())
                    .title(Span::styled(title, Theme::title())),
            )
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0));
        frame.render_widget(widget, area);
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, view: &PanelView<'_>) {
        let status = StatusBar::new().hints(panel_hints());
        let status = match &view.ui.error {
            Some(error) => status.error(error.clone()),
            None if is_pending(view.report) => status.right("verifying…"),
            None => status.right(format!("{} workload(s)", view.report.targets.len())),
        };
        frame.render_widget(status, area);
    }
}

fn is_pending(report: &InspectionReport) -> bool {
    report.vulnerabilities.loading || report.images.iter().any(|i| i.verification.loading)
}

fn badge(state: CheckState) -> Span<'static> {
    Span::styled(format!("{:<7}", state.as_str()), Theme::check(state))
}

/// Body of the panel: images, then the vulnerability verdict
pub fn summary_lines(report: &InspectionReport) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        format!("Images ({})", report.images.len()),
        Theme::section(),
    ))];

    if report.images.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No container images found.",
            Theme::text_dim(),
        )));
    }
    for image in &report.images {
        lines.extend(image_lines(image));
    }

    lines.push(Line::from(""));
    lines.extend(vulnerability_lines(report));
    lines
}

fn image_lines(image: &ImageReport) -> Vec<Line<'static>> {
    let pinned = if image.digest_pinned {
        Span::styled("pinned  ", Theme::check(CheckState::Pass))
    } else {
        Span::styled("unpinned", Theme::warning())
    };

    let mut lines = vec![
        Line::from(vec![
            Span::raw("  "),
            pinned,
            Span::raw(" "),
            Span::styled(image.image.clone(), Theme::text()),
        ]),
        Line::from(vec![
            Span::styled("    signed ", Theme::text_dim()),
            badge(image.signed),
            Span::styled(" sbom ", Theme::text_dim()),
            badge(image.sbom),
            Span::styled(" provenance ", Theme::text_dim()),
            Span::styled(image.provenance_url.clone(), Theme::link()),
        ]),
    ];
    for error in &image.verification.errors {
        lines.push(Line::from(Span::styled(format!("    ! {}", error), Theme::error())));
    }
    lines
}

fn vulnerability_lines(report: &InspectionReport) -> Vec<Line<'static>> {
    let vulns = &report.vulnerabilities;
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("Vulnerabilities ({}) ", report.scanner_name),
            Theme::section(),
        ),
        badge(report.vulnerability_state),
    ])];

    if !vulns.loading {
        let open = report.details.open.then_some(report.details.severity).flatten();
        let mut counts = vec![Span::raw("  ")];
        for severity in Severity::ALL {
            let style = if open == Some(severity) {
                Theme::severity_selected(severity)
            } else {
                Theme::severity(severity)
            };
            let key = severity.short().to_ascii_lowercase();
            counts.push(Span::styled(
                format!("[{}] {} {}", key, severity.label(), vulns.summary.get(severity)),
                style,
            ));
            counts.push(Span::raw("  "));
        }
        lines.push(Line::from(counts));
        lines.push(Line::from(Span::styled(
            format!(
                "  {} report(s) across {} workload(s)",
                vulns.report_count,
                report.targets.len()
            ),
            Theme::text_dim(),
        )));
    }
    if let Some(error) = &vulns.error {
        lines.push(Line::from(Span::styled(format!("  ! {}", error), Theme::error())));
    }
    lines
}

/// Findings of the open severity, or its loading / error state
pub fn detail_lines(details: &VulnerabilityDetailState) -> Vec<Line<'static>> {
    if details.loading {
        return vec![Line::from(Span::styled("Loading...", Theme::text_dim()))];
    }

    let mut lines = Vec::new();
    if let Some(error) = &details.error {
        lines.push(Line::from(Span::styled(format!("! {}", error), Theme::error())));
    }
    if details.items.is_empty() && details.error.is_none() {
        lines.push(Line::from(Span::styled("No findings.", Theme::text_dim())));
    }
    for item in &details.items {
        lines.extend(item_lines(item));
    }
    lines
}

fn item_lines(item: &VulnerabilityItem) -> Vec<Line<'static>> {
    let mut head = vec![Span::styled(item.headline().to_string(), Theme::text_highlight())];
    if let Some(package) = &item.package {
        head.push(Span::styled(format!("  {}", package), Theme::text()));
    }
    if let Some(installed) = &item.installed_version {
        let fixed = item.fixed_version.as_deref().unwrap_or("no fix");
        head.push(Span::styled(format!(" {} → {}", installed, fixed), Theme::text_dim()));
    }
    if let Some(target) = &item.target {
        head.push(Span::styled(format!("  [{}]", target), Theme::text_dim()));
    }

    let mut lines = vec![Line::from(head)];
    if let (Some(title), Some(_)) = (&item.title, &item.id) {
        lines.push(Line::from(Span::styled(format!("  {}", title), Theme::text())));
    }
    if let Some(link) = item.link() {
        lines.push(Line::from(Span::styled(format!("  {}", link), Theme::link())));
    }
    lines
}
