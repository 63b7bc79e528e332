//! Per-user points report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use pointsmap_db::Database;
use pointsmap_types::api::{AwarderSubtotal, Claims, ReportItem, ReportResponse};
use pointsmap_types::models::{Activity, GradingMethod};

use crate::award::{current_grade, escape_html};
use crate::error::PointsError;

/// Build the report of `user_id`. Students may only read their own.
pub fn build_report(
    db: &Database,
    claims: &Claims,
    activity: &Activity,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ReportResponse, PointsError> {
    if !claims.can_grade && claims.sub != user_id {
        return Err(PointsError::Forbidden);
    }

    let awards = db.get_awards_for_user(activity.id, user_id)?;
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now);

    let total: i64 = awards.iter().map(|a| a.points).sum();
    let today = db.sum_points_since(activity.id, user_id, start_of_day.timestamp())?;
    let grade = match db.get_grade(activity.id, user_id)? {
        Some(grade) => grade,
        None => current_grade(db, activity.id, user_id, activity.points_mode)?,
    };

    let mut people: Vec<Uuid> = awards.iter().map(|a| a.awarder_id).collect();
    people.push(user_id);
    people.sort();
    people.dedup();
    let names = db.get_user_names(&people)?;
    let name_of = |id: &Uuid| names.get(id).cloned().unwrap_or_else(|| id.to_string());

    let (items, awarders) = match activity.grading_method {
        GradingMethod::Simple => (Vec::new(), Vec::new()),
        GradingMethod::Advanced => {
            let items: Vec<ReportItem> = awards
                .iter()
                .map(|a| ReportItem {
                    time_awarded: a.time_awarded,
                    points: a.points,
                    awarder_id: a.awarder_id,
                    awarder_name: name_of(&a.awarder_id),
                    comment: a.comment.clone(),
                })
                .collect();

            let mut by_awarder: BTreeMap<Uuid, (i64, usize)> = BTreeMap::new();
            for a in &awards {
                let entry = by_awarder.entry(a.awarder_id).or_default();
                entry.0 += a.points;
                entry.1 += 1;
            }
            let awarders = by_awarder
                .into_iter()
                .map(|(awarder_id, (points, award_count))| AwarderSubtotal {
                    awarder_id,
                    awarder_name: name_of(&awarder_id),
                    points,
                    award_count,
                })
                .collect();
            (items, awarders)
        }
    };

    let mut report = ReportResponse {
        user_id,
        full_name: name_of(&user_id),
        grading_method: activity.grading_method,
        grade,
        total,
        today,
        award_count: awards.len(),
        items,
        awarders,
        html: String::new(),
    };
    report.html = render_report(&report);
    Ok(report)
}

fn render_report(report: &ReportResponse) -> String {
    let mut html = format!(
        "<div class=\"pointsmap-report\"><h3>{}</h3>\
         <dl><dt>Grade</dt><dd>{}</dd><dt>Total</dt><dd>{}</dd>\
         <dt>Today</dt><dd>{}</dd><dt>Awards</dt><dd>{}</dd></dl>",
        escape_html(&report.full_name),
        report.grade,
        report.total,
        report.today,
        report.award_count
    );

    if !report.items.is_empty() {
        html.push_str("<table class=\"pointsmap-report-items\">");
        html.push_str("<tr><th>Time</th><th>Points</th><th>By</th><th>Comment</th></tr>");
        for item in &report.items {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                item.time_awarded.format("%Y-%m-%d %H:%M"),
                item.points,
                escape_html(&item.awarder_name),
                escape_html(&item.comment)
            ));
        }
        html.push_str("</table>");
    }

    if !report.awarders.is_empty() {
        html.push_str("<ul class=\"pointsmap-report-awarders\">");
        for a in &report.awarders {
            html.push_str(&format!(
                "<li>{}: {} ({} awards)</li>",
                escape_html(&a.awarder_name),
                a.points,
                a.award_count
            ));
        }
        html.push_str("</ul>");
    }

    html.push_str("</div>");
    html
}
