use super::*;

fn track_body() -> Vec<u8> {
    let mut enc = DmapEncoder::new();
    enc.encode_tag(
        DmapTag::ListingItem,
        &DmapValue::Container(vec![
            (DmapTag::ItemName, DmapValue::String("Blue in Green".into())),
            (DmapTag::SongArtist, DmapValue::String("Miles Davis".into())),
            (DmapTag::SongAlbum, DmapValue::String("Kind of Blue".into())),
            (DmapTag::SongTime, DmapValue::Int(337_000)),
            (DmapTag::Unknown(*b"caps"), DmapValue::Raw(vec![1])),
        ]),
    );
    enc.finish()
}

#[test]
fn test_parse_nested_listing_item() {
    let value = DmapParser::parse(&track_body()).unwrap();

    assert_eq!(value.find_string(DmapTag::ItemName), Some("Blue in Green"));
    assert_eq!(value.find_string(DmapTag::SongArtist), Some("Miles Davis"));
    assert_eq!(value.find_string(DmapTag::SongAlbum), Some("Kind of Blue"));
    assert_eq!(value.find_int(DmapTag::SongTime), Some(337_000));
    assert_eq!(value.find_string(DmapTag::SongGenre), None);
}

#[test]
fn test_parse_flat_items() {
    let mut enc = DmapEncoder::new();
    enc.string(DmapTag::SongArtist, "Nina Simone");
    let value = DmapParser::parse(&enc.finish()).unwrap();

    assert_eq!(value.find_string(DmapTag::SongArtist), Some("Nina Simone"));
}

#[test]
fn test_truncated_item_is_rejected() {
    let mut body = track_body();
    body.truncate(body.len() - 3);
    assert!(matches!(
        DmapParser::parse(&body),
        Err(DmapDecodeError::UnexpectedEnd)
    ));

    assert!(DmapParser::parse(b"minm").is_err());
}

#[test]
fn test_empty_body_is_empty_container() {
    assert_eq!(
        DmapParser::parse(&[]).unwrap(),
        DmapValue::Container(Vec::new())
    );
}

#[test]
fn test_tag_display() {
    assert_eq!(DmapTag::SongAlbum.to_string(), "asal");
    assert_eq!(DmapTag::from_bytes(*b"zzzz").to_string(), "zzzz");
}

#[test]
fn test_artwork_format_detection() {
    let jpeg = Artwork::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg");
    assert_eq!(jpeg.format, Some(ArtworkFormat::Jpeg));

    let declared = Artwork::new(vec![0, 0, 0, 0], "image/png");
    assert_eq!(declared.format, Some(ArtworkFormat::Png));

    let unknown = Artwork::new(vec![0, 0, 0, 0], "image/none");
    assert_eq!(unknown.format, None);
    assert!(Artwork::new(Vec::new(), "image/none").is_empty());
}

#[test]
fn test_png_dimensions() {
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0, 0, 0, 13]);
    png.extend_from_slice(b"IHDR");
    png.extend_from_slice(&600u32.to_be_bytes());
    png.extend_from_slice(&400u32.to_be_bytes());

    let art = Artwork::new(png, "image/png");
    assert_eq!(art.png_dimensions(), Some((600, 400)));
    assert_eq!(ArtworkFormat::Png.mime_type(), "image/png");
}
