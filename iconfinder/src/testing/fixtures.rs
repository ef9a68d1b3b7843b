//! Test bodies: generated images and captured HTML pages.

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

use crate::ico::encode_ico;

fn solid(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([0x1e, 0x88, 0xe5, 0xff]))
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut out = Vec::new();
    let result = if format == ImageFormat::Jpeg {
        RgbImage::from_pixel(width, height, Rgb([0x1e, 0x88, 0xe5]))
            .write_to(&mut Cursor::new(&mut out), format)
    } else {
        solid(width, height).write_to(&mut Cursor::new(&mut out), format)
    };
    if let Err(e) = result {
        panic!("encoding a {width}x{height} {format:?} fixture failed: {e}");
    }
    out
}

/// A PNG of the given size.
#[must_use]
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// A GIF of the given size.
#[must_use]
pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Gif)
}

/// A JPEG of the given size.
#[must_use]
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

/// An icon container with one square PNG entry per size.
#[must_use]
pub fn ico_bytes(sizes: &[u32]) -> Vec<u8> {
    let images: Vec<RgbaImage> = sizes.iter().map(|&s| solid(s, s)).collect();
    match encode_ico(&images) {
        Ok(bytes) => bytes,
        Err(e) => panic!("encoding ico fixture {sizes:?} failed: {e}"),
    }
}

/// A page of `depth` nested `<div>` elements.
#[must_use]
pub fn nested_divs(depth: usize) -> String {
    format!("<html><body>{}</body></html>", "<div>".repeat(depth))
}

/// A minimal SVG document.
pub const SVG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 16 16"><circle cx="8" cy="8" r="8"/></svg>"#;

/// Front page of daringfireball.net (trimmed).
pub const DARINGFIREBALL_HTML: &str = r##"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN"
  "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" lang="en">
<head>
<meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
<meta name="viewport" content="width=600, initial-scale=0.5, minimum-scale=0.45" />
<title>Daring Fireball</title>
<link rel="apple-touch-icon-precomposed-nope" href="/graphics/ignored.png" />
<link rel="apple-touch-icon" href="/graphics/apple-touch-icon.png" />
<link rel="shortcut icon" href="/graphics/favicon.ico?v=005" />
<link rel="mask-icon" color="#4a525a" href="/graphics/dfstar.svg" />
<link rel="stylesheet" type="text/css" media="screen" href="/css/fireball_screen.css?v1.7" />
<link rel="alternate" type="application/atom+xml" href="/feeds/main" />
<script src="/mint/?js" type="text/javascript"></script>
</head>
<body onload="disqus_domain = 'disqus.com';">
<div id="Box">
<div id="Banner"><a href="/" title="Daring Fireball: Home"><img src="/graphics/logos/" alt="Daring Fireball" height="56" /></a></div>
<div id="Main">
<dl class="linkedlist">
<dt><a href="https://www.apple.com/">Linked item</a></dt>
<dd><p>Some commentary.</p></dd>
</dl>
</div>
</div>
</body>
</html>
"##;

/// Front page of newyorker.com (trimmed).
pub const NEWYORKER_HTML: &str = r#"<!DOCTYPE html>
<html lang="en-US" class="no-js">
<head>
<meta charset="UTF-8">
<title>The New Yorker</title>
<link rel="shortcut icon" href="/wp-content/assets/dist/img/icon/favicon.ico">
<link rel="apple-touch-icon" href="/wp-content/assets/dist/img/icon/apple-touch-icon.png">
<link rel="apple-touch-icon-precomposed" href="/wp-content/assets/dist/img/icon/apple-touch-icon-precomposed.png">
<link rel="apple-touch-icon-precomposed" sizes="57x57" href="/wp-content/assets/dist/img/icon/apple-touch-icon-57x57-precomposed.png">
<link rel="apple-touch-icon-precomposed" sizes="114x114" href="/wp-content/assets/dist/img/icon/apple-touch-icon-114x114-precomposed.png">
<link rel="apple-touch-icon-precomposed" sizes="144x144" href="/wp-content/assets/dist/img/icon/apple-touch-icon-144x144-precomposed.png">
<link rel="stylesheet" href="/wp-content/assets/dist/css/main.css" type="text/css" media="all">
<link rel="canonical" href="http://www.newyorker.com/">
<meta property="og:image" content="http://www.newyorker.com/wp-content/assets/dist/img/logo.png">
</head>
<body class="home">
<header><a href="/"><img src="/wp-content/assets/dist/img/logo.svg" alt="The New Yorker"></a></header>
<main><article><h2><a href="/magazine">This week's issue</a></h2></article></main>
</body>
</html>
"#;
