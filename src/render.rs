//! Server-rendered HTML fragment for htmx clients.

// self
use crate::service::{Attendee, Rsvps};

/// Renders both attendee lists as an HTML fragment.
pub fn render_rsvps(rsvps: &Rsvps) -> String {
	let mut out = String::with_capacity(256 + 128 * (rsvps.yes.len() + rsvps.no.len()));

	out.push_str("<div class=\"rsvps\">\n");
	render_section(&mut out, "yes", "Attending", &rsvps.yes);
	render_section(&mut out, "no", "Not attending", &rsvps.no);
	out.push_str("</div>\n");

	out
}

fn render_section(out: &mut String, class: &str, title: &str, attendees: &[Attendee]) {
	let total: u64 = attendees.iter().map(|attendee| 1 + u64::from(attendee.guests)).sum();

	out.push_str(&format!(
		"<section class=\"rsvps__{class}\">\n<h3>{title} <span class=\"rsvps__count\">({total})</span></h3>\n"
	));

	if attendees.is_empty() {
		out.push_str("<p class=\"rsvps__empty\">Nobody yet.</p>\n</section>\n");

		return;
	}

	out.push_str("<ul>\n");

	for attendee in attendees {
		render_attendee(out, attendee);
	}

	out.push_str("</ul>\n</section>\n");
}

fn render_attendee(out: &mut String, attendee: &Attendee) {
	out.push_str("<li class=\"rsvp\" data-member-id=\"");
	push_escaped(out, &attendee.id);
	out.push_str("\">");

	if let Some(thumb) = attendee.thumb_link.as_deref().or(attendee.photo_link.as_deref()) {
		out.push_str("<img class=\"rsvp__avatar\" loading=\"lazy\" alt=\"\" src=\"");
		push_escaped(out, thumb);
		out.push_str("\">");
	}

	out.push_str("<span class=\"rsvp__name\">");
	push_escaped(out, &attendee.name);
	out.push_str("</span>");

	if attendee.guests > 0 {
		out.push_str(&format!("<span class=\"rsvp__guests\">+{}</span>", attendee.guests));
	}

	out.push_str("</li>\n");
}

fn push_escaped(out: &mut String, raw: &str) {
	for c in raw.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}
}
