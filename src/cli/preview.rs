use reqwest::Client;
use tabled::Table;

use crate::{
    archive,
    config::Settings,
    error, info,
    pipeline::build_preview,
    success,
    types::TrackTableRow,
    utils,
};

pub async fn preview(settings: Settings, input: &str) {
    let client = match Client::builder().timeout(settings.http_timeout).build() {
        Ok(client) => client,
        Err(e) => error!("Cannot create http client: {}", e),
    };

    let collection = match archive::fetch_collection(&client, &settings, input).await {
        Ok(collection) => collection,
        Err(e) => error!("{}", e.actionable()),
    };
    let preview = build_preview(&collection);

    info!(
        "{} ({})",
        if preview.metadata.title.is_empty() {
            &preview.metadata.identifier
        } else {
            &preview.metadata.title
        },
        preview.metadata.url
    );
    for (label, value) in [
        ("Performer", &preview.metadata.performer),
        ("Venue", &preview.metadata.venue),
        ("Date", &preview.metadata.date),
    ] {
        if !value.is_empty() {
            println!("    {}: {}", label, value);
        }
    }

    let rows: Vec<TrackTableRow> = preview
        .tracks
        .iter()
        .map(|t| TrackTableRow {
            number: t.number,
            title: t.video_title.clone(),
            duration: utils::format_duration(t.duration_seconds),
            file: t.audio_filename.clone(),
        })
        .collect();

    println!(
        "\nPlaylist: {title}\n{table}\n",
        title = preview.playlist.title,
        table = Table::new(rows)
    );

    if let Some(first) = preview.tracks.first() {
        println!("Description of track {}:\n{}\n", first.number, first.description_preview);
    }

    success!(
        "{} tracks, {} total",
        preview.playlist.track_count,
        utils::format_duration(Some(preview.total_duration_seconds))
    );
}
