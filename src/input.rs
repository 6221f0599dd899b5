//! Resolution of classifier inputs into RGB rasters.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{DynamicImage, ImageReader, RgbImage};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::error::{ClassifyError, FetchError};

/// An image to classify: already decoded, on disk, or behind an HTTP(S) URL.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Decoded(DynamicImage),
    Path(PathBuf),
    Url(Url),
}

impl ImageInput {
    /// Interprets `reference` as an `http`/`https` URL if it parses as one,
    /// otherwise as a filesystem path.
    pub fn parse(reference: &str) -> Self {
        match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ImageInput::Url(url),
            _ => ImageInput::Path(PathBuf::from(reference)),
        }
    }

    /// Loads the image and converts it to 8-bit RGB.
    pub fn resolve(self, fetcher: &ImageFetcher) -> Result<RgbImage, ClassifyError> {
        match self {
            ImageInput::Decoded(image) => Ok(image.to_rgb8()),
            ImageInput::Path(path) => decode_file(&path).map(|image| image.to_rgb8()),
            ImageInput::Url(url) => {
                let bytes = fetcher.fetch(&url)?;
                image::load_from_memory(&bytes)
                    .map(|image| image.to_rgb8())
                    .map_err(|source| ClassifyError::Decode {
                        origin: url.to_string(),
                        source,
                    })
            }
        }
    }
}

impl fmt::Display for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageInput::Decoded(image) => {
                write!(f, "in-memory image {}x{}", image.width(), image.height())
            }
            ImageInput::Path(path) => write!(f, "{}", path.display()),
            ImageInput::Url(url) => write!(f, "{url}"),
        }
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(image: DynamicImage) -> Self {
        ImageInput::Decoded(image)
    }
}

impl From<RgbImage> for ImageInput {
    fn from(image: RgbImage) -> Self {
        ImageInput::Decoded(DynamicImage::ImageRgb8(image))
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

impl From<&Path> for ImageInput {
    fn from(path: &Path) -> Self {
        ImageInput::Path(path.to_path_buf())
    }
}

impl From<Url> for ImageInput {
    fn from(url: Url) -> Self {
        ImageInput::Url(url)
    }
}

impl From<&str> for ImageInput {
    fn from(reference: &str) -> Self {
        ImageInput::parse(reference)
    }
}

impl From<String> for ImageInput {
    fn from(reference: String) -> Self {
        ImageInput::parse(&reference)
    }
}

/// Guesses the format from content, falling back on the file extension.
fn decode_file(path: &Path) -> Result<DynamicImage, ClassifyError> {
    let read_err = |source| ClassifyError::Read {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)
        .map_err(read_err)?
        .with_guessed_format()
        .map_err(read_err)?
        .decode()
        .map_err(|source| ClassifyError::Decode {
            origin: path.display().to_string(),
            source,
        })
}

/// Blocking HTTP client for image URLs.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    http: Client,
}

impl ImageFetcher {
    /// `timeout` of `None` keeps the client's default.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(FetchError::Client)?;
        Ok(Self { http })
    }

    /// Wraps an already configured client.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Downloads the body at `url`, rejecting error statuses and non-image content types.
    pub fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        log::debug!("Fetching image from {}", url);
        let response = self.http.get(url.clone()).send().map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_image_content_type(content_type) {
                return Err(FetchError::NotAnImage {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        let bytes = response.bytes().map_err(request_err)?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

fn is_image_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("image/") || mime == "application/octet-stream"
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one canned HTTP response on a loopback port, returning its URL.
    fn serve_once(content_type: &'static str, body: Vec<u8>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
                     Connection: close\r\n\r\n",
                    content_type,
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(&body);
            }
        });
        Url::parse(&format!("http://{addr}/image")).expect("url")
    }

    fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .expect("encode png");
        bytes.into_inner()
    }

    /// Loopback-only client; proxies from the environment would intercept 127.0.0.1.
    pub(crate) fn fetcher() -> ImageFetcher {
        let http = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("client");
        ImageFetcher::with_client(http)
    }

    #[test]
    fn parses_urls_and_paths() {
        assert!(matches!(
            ImageInput::parse("https://example.com/cat.png"),
            ImageInput::Url(_)
        ));
        assert!(matches!(
            ImageInput::parse("http://localhost:8080/x.jpg"),
            ImageInput::Url(_)
        ));
        assert!(matches!(
            ImageInput::parse("photos/cat.png"),
            ImageInput::Path(_)
        ));
        assert!(matches!(
            ImageInput::parse("ftp://example.com/cat.png"),
            ImageInput::Path(_)
        ));
    }

    #[test]
    fn content_type_check() {
        assert!(is_image_content_type("image/png"));
        assert!(is_image_content_type("Image/JPEG; charset=binary"));
        assert!(is_image_content_type("application/octet-stream"));
        assert!(!is_image_content_type("text/html; charset=utf-8"));
        assert!(!is_image_content_type("application/json"));
    }

    #[test]
    fn decoded_input_is_used_directly() {
        let image = RgbImage::from_pixel(5, 7, image::Rgb([9, 8, 7]));
        let rgb = ImageInput::from(image.clone())
            .resolve(&fetcher())
            .expect("resolve");
        assert_eq!(rgb, image);
    }

    #[test]
    fn fetches_and_decodes_image_url() {
        let url = serve_once("image/png", png_bytes());
        let rgb = ImageInput::from(url).resolve(&fetcher()).expect("resolve");
        assert_eq!(rgb.dimensions(), (4, 3));
        assert_eq!(rgb.get_pixel(0, 0), &image::Rgb([1, 2, 3]));
    }

    #[test]
    fn non_image_payload_is_a_fetch_error() {
        let url = serve_once("text/html", b"<html>not an image</html>".to_vec());
        let err = ImageInput::from(url).resolve(&fetcher()).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Fetch(FetchError::NotAnImage { .. })
        ));
    }

    #[test]
    fn corrupt_image_payload_is_a_decode_error() {
        let url = serve_once("image/png", b"definitely not a png".to_vec());
        let err = ImageInput::from(url).resolve(&fetcher()).unwrap_err();
        assert!(matches!(err, ClassifyError::Decode { .. }));
    }

    #[test]
    fn unreachable_url_is_a_fetch_error() {
        // Bind then drop to get a loopback port with nothing listening.
        let port = TcpListener::bind("127.0.0.1:0")
            .expect("bind listener")
            .local_addr()
            .expect("local addr")
            .port();
        let input = ImageInput::parse(&format!("http://127.0.0.1:{port}/missing.png"));
        let err = input.resolve(&fetcher()).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Fetch(FetchError::Request { .. })
        ));
    }

    #[test]
    fn local_files_decode_or_fail_by_kind() {
        let dir = std::env::temp_dir().join(format!("deepfake-input-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");

        let png = dir.join("pixel.png");
        std::fs::write(&png, png_bytes()).expect("write png");
        let rgb = ImageInput::from(png.as_path())
            .resolve(&fetcher())
            .expect("decode png");
        assert_eq!(rgb.dimensions(), (4, 3));

        let text = dir.join("notes.txt");
        std::fs::write(&text, "just some text").expect("write text");
        let err = ImageInput::from(text).resolve(&fetcher()).unwrap_err();
        assert!(matches!(err, ClassifyError::Decode { .. }));

        let missing = dir.join("missing.png");
        let err = ImageInput::from(missing).resolve(&fetcher()).unwrap_err();
        assert!(matches!(err, ClassifyError::Read { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
