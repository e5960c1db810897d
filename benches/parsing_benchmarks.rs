//! Benchmarks for track-dump parsing, event-list parsing, and timecode
//! conversion.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features

use std::hint::black_box;
use std::path::Path;

use criterion::Criterion;
use sub2srt::{TrackFilter, convert_timecode, parse_event_list, parse_tracks};

/// A dump with `count` subtitle tracks in alternating languages.
fn track_dump(count: usize) -> String {
    let mut dump = String::from("+ EBML head\n+ Segment: size 1893022345\n|+ Tracks\n");
    for index in 0..count {
        let language = if index % 2 == 0 { "eng" } else { "ger" };
        dump.push_str(&format!(
            "| + Track\n\
             |  + Track number: {} (track ID for mkvmerge & mkvextract: {index})\n\
             |  + Track type: subtitles\n\
             |  + \"Default track\" flag: {}\n\
             |  + Codec ID: S_HDMV/PGS\n\
             |  + Language: {language}\n",
            index + 1,
            u8::from(index == 0),
        ));
    }
    dump.push_str("|+ Cluster\n");
    dump
}

/// An event list with `count` cues at 23.976 fps.
fn event_list(count: usize) -> String {
    let mut xml = String::from(
        "<BDN Version=\"0.93\"><Description><Language Code=\"eng\"/>\
         <Format VideoFormat=\"1080p\" FrameRate=\"23.976\"/></Description><Events>",
    );
    for index in 0..count {
        let (minutes, seconds) = (index / 60, index % 60);
        xml.push_str(&format!(
            "<Event InTC=\"00:{minutes:02}:{seconds:02}:00\" OutTC=\"00:{minutes:02}:{seconds:02}:20\">\
             <Graphic Width=\"720\" Height=\"80\" X=\"600\" Y=\"950\">movie_{index:04}.png</Graphic></Event>"
        ));
    }
    xml.push_str("</Events></BDN>");
    xml
}

fn benchmark_track_parsing(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("parse_tracks");
    for count in [4, 64] {
        let dump = track_dump(count);
        let filter = TrackFilter::unrestricted();
        group.bench_function(format!("{count} tracks"), |bencher| {
            bencher.iter(|| parse_tracks(black_box(&dump), &filter));
        });
    }
    group.finish();
}

fn benchmark_event_list_parsing(criterion: &mut Criterion) {
    let xml = event_list(1500);
    criterion.bench_function("parse_event_list (1500 cues)", |bencher| {
        bencher.iter(|| parse_event_list(black_box(&xml), Path::new("movie.xml")));
    });
}

fn benchmark_timecode_conversion(criterion: &mut Criterion) {
    criterion.bench_function("convert_timecode", |bencher| {
        bencher.iter(|| convert_timecode(black_box("01:23:45:12"), black_box(23)));
    });
}

criterion::criterion_group!(
    benches,
    benchmark_track_parsing,
    benchmark_event_list_parsing,
    benchmark_timecode_conversion,
);
criterion::criterion_main!(benches);
