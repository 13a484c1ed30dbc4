//! Titles and descriptions for videos and playlists.
//!
//! Every description carries two machine readable lines: the track line
//! (`Track 3 of 12`) and the marker line (`Source: https://archive.org/details/...`).
//! The marker identifies the collection on the channel, the track line maps
//! an existing video back to its track on later runs.

use crate::{
    types::{Collection, PlaylistMetadata, Privacy, Track, VideoMetadata},
    utils,
};

pub const VIDEO_TITLE_MAX_CHARS: usize = 100;
pub const PLAYLIST_TITLE_MAX_CHARS: usize = 150;
pub const DESCRIPTION_MAX_BYTES: usize = 5000;
pub const PREVIEW_MAX_CHARS: usize = 300;
/// YouTube category "Music".
pub const MUSIC_CATEGORY_ID: &str = "10";

const COLLECTION_NOTES_MAX_CHARS: usize = 1500;

pub fn track_line(number: u32, total: usize) -> String {
    format!("Track {} of {}", number, total)
}

pub fn marker_line(marker: &str) -> String {
    format!("Source: {}", marker)
}

/// Whether `description` carries the marker line of `marker`. Whole-line
/// comparison, so `.../details/show` does not match `.../details/show2`.
pub fn has_marker(description: &str, marker: &str) -> bool {
    let expected = marker_line(marker);
    description.lines().any(|line| line.trim() == expected)
}

/// Recovers the track number from a description written by
/// [`video_description`].
pub fn match_track_number(description: &str) -> Option<u32> {
    description.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Track ")?;
        let (number, _total) = rest.split_once(" of ")?;
        number.trim().parse().ok()
    })
}

pub fn video_title(track: &Track, collection: &Collection) -> String {
    let mut title = if collection.performer.is_empty() {
        track.name.clone()
    } else {
        format!("{} - {}", collection.performer, track.name)
    };
    if !collection.date.is_empty() {
        title.push_str(&format!(" ({})", collection.date));
    }

    let title = utils::truncate_chars(&utils::youtube_safe(&title), VIDEO_TITLE_MAX_CHARS);
    if title.is_empty() {
        format!("Track {}", track.number)
    } else {
        title
    }
}

pub fn video_description(track: &Track, collection: &Collection) -> String {
    let mut body = String::new();
    body.push_str(&track_line(track.number, collection.tracks.len()));
    body.push('\n');
    body.push_str(&track.name);
    body.push_str("\n\n");
    push_collection_facts(&mut body, collection);

    if !collection.recorder.is_empty() {
        body.push('\n');
        body.push_str(&collection.recorder);
        body.push('\n');
    }

    let notes = collection_notes(collection);
    if !notes.is_empty() {
        body.push('\n');
        body.push_str(&notes);
        body.push('\n');
    }

    with_marker(&body, &collection.url)
}

pub fn playlist_title(collection: &Collection) -> String {
    let parts: Vec<&str> = [
        collection.performer.as_str(),
        collection.date.as_str(),
        collection.venue.as_str(),
    ]
    .into_iter()
    .filter(|p| !p.is_empty())
    .collect();

    let title = if parts.is_empty() {
        collection.title.clone()
    } else {
        parts.join(" - ")
    };
    let title = utils::truncate_chars(&utils::youtube_safe(&title), PLAYLIST_TITLE_MAX_CHARS);
    if title.is_empty() {
        collection.identifier.clone()
    } else {
        title
    }
}

pub fn playlist_description(collection: &Collection) -> String {
    let mut body = String::new();
    if !collection.title.is_empty() {
        body.push_str(&collection.title);
        body.push_str("\n\n");
    }
    push_collection_facts(&mut body, collection);

    body.push_str("\nTracks:\n");
    for track in &collection.tracks {
        match track.duration {
            Some(_) => body.push_str(&format!(
                "{}. {} ({})\n",
                track.number,
                track.name,
                utils::format_duration(track.duration)
            )),
            None => body.push_str(&format!("{}. {}\n", track.number, track.name)),
        }
    }

    with_marker(&body, &collection.url)
}

pub fn video_tags(collection: &Collection) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in [
        collection.performer.as_str(),
        collection.venue.as_str(),
        "live music",
        "archive.org",
    ] {
        let tag = utils::truncate_chars(&utils::youtube_safe(tag), 30);
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

pub fn video_metadata(track: &Track, collection: &Collection) -> VideoMetadata {
    VideoMetadata {
        title: video_title(track, collection),
        description: video_description(track, collection),
        tags: video_tags(collection),
        category_id: MUSIC_CATEGORY_ID.to_string(),
        privacy: Privacy::Private,
    }
}

pub fn playlist_metadata(collection: &Collection) -> PlaylistMetadata {
    PlaylistMetadata {
        title: playlist_title(collection),
        description: playlist_description(collection),
        privacy: Privacy::Private,
    }
}

pub fn description_preview(description: &str) -> String {
    if description.chars().count() > PREVIEW_MAX_CHARS {
        format!("{}...", utils::truncate_chars(description, PREVIEW_MAX_CHARS))
    } else {
        description.to_string()
    }
}

fn push_collection_facts(body: &mut String, collection: &Collection) {
    for (label, value) in [
        ("Performer", &collection.performer),
        ("Venue", &collection.venue),
        ("Date", &collection.date),
    ] {
        if !value.is_empty() {
            body.push_str(&format!("{}: {}\n", label, value));
        }
    }
}

fn collection_notes(collection: &Collection) -> String {
    let text = utils::strip_html(&collection.description);
    let lines: Vec<String> = text
        .lines()
        .map(utils::collapse_whitespace)
        .filter(|l| !l.is_empty())
        .collect();
    utils::truncate_chars(&lines.join("\n"), COLLECTION_NOTES_MAX_CHARS)
}

/// Appends the marker line, clipping the body so the marker always fits.
fn with_marker(body: &str, marker: &str) -> String {
    let marker = marker_line(marker);
    let body = utils::youtube_safe(body);
    let room = DESCRIPTION_MAX_BYTES.saturating_sub(marker.len() + 2);
    let body = utils::clip_bytes(body.trim_end(), room);
    format!("{}\n\n{}", body, marker)
}
