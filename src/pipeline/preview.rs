use crate::{
    format,
    types::{Collection, Preview, PreviewCollection, PreviewPlaylist, PreviewTrack},
};

/// What a run would publish, computed without touching the network.
pub fn build_preview(collection: &Collection) -> Preview {
    let tracks = collection
        .tracks
        .iter()
        .map(|track| PreviewTrack {
            number: track.number,
            name: track.name.clone(),
            video_title: format::video_title(track, collection),
            duration_seconds: track.duration,
            description_preview: format::description_preview(&format::video_description(
                track, collection,
            )),
            audio_filename: track.audio_file_name(&collection.identifier),
        })
        .collect();

    Preview {
        metadata: PreviewCollection {
            identifier: collection.identifier.clone(),
            title: collection.title.clone(),
            performer: collection.performer.clone(),
            venue: collection.venue.clone(),
            date: collection.date.clone(),
            url: collection.url.clone(),
        },
        playlist: PreviewPlaylist {
            title: format::playlist_title(collection),
            description: format::playlist_description(collection),
            track_count: collection.tracks.len(),
        },
        tracks,
        total_duration_seconds: collection.tracks.iter().filter_map(|t| t.duration).sum(),
    }
}
