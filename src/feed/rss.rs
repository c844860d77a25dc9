use std::fmt::Display;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::storage::{Episode, FeedState};
use crate::util::{write_atomic, xml_safe};

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const GENERATOR: &str = concat!("channelcast ", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while rendering or publishing a feed.
#[derive(Debug, Error)]
pub enum RssError {
    #[error("Failed to write XML: {0}")]
    Xml(String),

    #[error("Generated feed contains invalid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Failed to write feed file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn xml_err(e: impl Display) -> RssError {
    RssError::Xml(e.to_string())
}

/// Renders a feed state as an RSS 2.0 podcast document.
///
/// Pure function of `state`: the same state always yields the same bytes.
/// Episodes are emitted in the order they appear in the state.
pub fn render(state: &FeedState) -> Result<String, RssError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:itunes", ITUNES_NS));
    writer.write_event(Event::Start(rss)).map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_err)?;

    write_text_element(&mut writer, "title", &state.title)?;
    write_text_element(&mut writer, "link", &state.website)?;
    write_text_element(&mut writer, "description", &state.description)?;
    write_text_element(&mut writer, "generator", GENERATOR)?;
    write_text_element(
        &mut writer,
        "itunes:explicit",
        if state.explicit { "true" } else { "false" },
    )?;

    if !state.image.is_empty() {
        write_itunes_image(&mut writer, &state.image)?;

        writer
            .write_event(Event::Start(BytesStart::new("image")))
            .map_err(xml_err)?;
        write_text_element(&mut writer, "url", &state.image)?;
        write_text_element(&mut writer, "title", &state.title)?;
        write_text_element(&mut writer, "link", &state.website)?;
        writer
            .write_event(Event::End(BytesEnd::new("image")))
            .map_err(xml_err)?;
    }

    for episode in &state.episodes {
        write_item(&mut writer, episode)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_err)?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

/// Renders `state` and atomically replaces the feed file at `path`.
pub fn write_feed(state: &FeedState, path: &Path) -> Result<(), RssError> {
    let content = render(state)?;
    write_atomic(path, content.as_bytes()).map_err(|source| RssError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_item<W: Write>(writer: &mut Writer<W>, episode: &Episode) -> Result<(), RssError> {
    writer
        .write_event(Event::Start(BytesStart::new("item")))
        .map_err(xml_err)?;

    write_text_element(writer, "title", &episode.title)?;
    if !episode.summary.is_empty() {
        write_text_element(writer, "description", &episode.summary)?;
        write_text_element(writer, "itunes:summary", &episode.summary)?;
    }

    let size = episode.media.size.to_string();
    let mut enclosure = BytesStart::new("enclosure");
    enclosure.push_attribute(("url", episode.media.url.as_str()));
    enclosure.push_attribute(("length", size.as_str()));
    enclosure.push_attribute(("type", episode.media.mime_type.as_str()));
    writer.write_event(Event::Empty(enclosure)).map_err(xml_err)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    writer.write_event(Event::Start(guid)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&xml_safe(&episode.source_url))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("guid")))
        .map_err(xml_err)?;

    write_text_element(writer, "pubDate", &episode.published.to_rfc2822())?;

    if let Some(thumbnail) = &episode.thumbnail {
        write_itunes_image(writer, thumbnail)?;
    }
    if let Some(secs) = episode.duration_secs {
        write_text_element(writer, "itunes:duration", &format_duration(secs))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("item")))
        .map_err(xml_err)?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), RssError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&xml_safe(text))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn write_itunes_image<W: Write>(writer: &mut Writer<W>, href: &str) -> Result<(), RssError> {
    let mut image = BytesStart::new("itunes:image");
    image.push_attribute(("href", href));
    writer.write_event(Event::Empty(image)).map_err(xml_err)?;
    Ok(())
}

/// `HH:MM:SS`, the form every podcast client accepts for `itunes:duration`.
fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
