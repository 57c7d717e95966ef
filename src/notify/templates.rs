use chrono::{DateTime, Utc};
use html_escape::encode_text;

use crate::models::Event;

const SIGNATURE: &str = "<p>By EventHub Team</p>";

fn when(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

// Subjects are plain text; everything user-supplied in a body is escaped.

pub fn reminder(name: &str, event: &Event, lead_hours: i64) -> (String, String) {
    let subject = format!("Reminder: {} is happening soon!", event.title);
    let body = format!(
        "<h3>Hello {name},</h3>\
         <p>We would like to remind you that the event you registered for is happening soon.</p>\
         <p>You have registered for <strong>{title}</strong>.</p>\
         <p>Date &amp; Time: {date}</p>\
         <p>Venue: {venue}</p>\
         <p>Speaker: {speaker}</p>\
         <p>Don't forget it's less than {lead_hours} hours away!</p>\
         {SIGNATURE}",
        name = encode_text(name),
        title = encode_text(&event.title),
        date = when(event.starts_at),
        venue = encode_text(&event.venue),
        speaker = encode_text(&event.speaker),
    );
    (subject, body)
}

pub fn updated(name: &str, before: &Event, after: &Event) -> (String, String) {
    let subject = format!("Event Updated: {}", after.title);
    let body = format!(
        "<p>Hello {name},</p>\
         <p>We would like to inform you that the event you registered for has been updated.</p>\
         <p>The event <strong>{title}</strong> has been updated.</p>\
         <p><strong>Old Date:</strong> {old_date} | <strong>Old Speaker:</strong> {old_speaker} | <strong>Old Venue:</strong> {old_venue}<br>\
         <strong>New Date:</strong> {new_date} | <strong>New Speaker:</strong> {new_speaker} | <strong>New Venue:</strong> {new_venue}</p>\
         {SIGNATURE}",
        name = encode_text(name),
        title = encode_text(&after.title),
        old_date = when(before.starts_at),
        old_speaker = encode_text(&before.speaker),
        old_venue = encode_text(&before.venue),
        new_date = when(after.starts_at),
        new_speaker = encode_text(&after.speaker),
        new_venue = encode_text(&after.venue),
    );
    (subject, body)
}

pub fn cancelled(name: &str, event: &Event) -> (String, String) {
    let subject = format!("Event Cancelled: {}", event.title);
    let body = format!(
        "<p>Hello {name},</p>\
         <p>We regret to inform you that the event you registered for has been cancelled.</p>\
         <p>The event <strong>{title}</strong> scheduled on <strong>{date}</strong> has been cancelled by the organizer.</p>\
         <p>We apologize for the inconvenience</p>\
         {SIGNATURE}",
        name = encode_text(name),
        title = encode_text(&event.title),
        date = when(event.starts_at),
    );
    (subject, body)
}
