use log::info;
use rouille::{Request, Response, input::multipart::get_multipart_input};
use serde::Serialize;
use std::{io::Read, path::Path};

use crate::{
    config::{HttpConfig, QueryConfig, UploadConfig},
    domain::{
        query::{DEFAULT_LIMIT, DEFAULT_PAGE, Page, ParseQueryError, SortField, SortOrder, TrackQuery},
        slug::slugify,
        track::Track,
    },
    http::{
        error::ApiError,
        requests::{BatchDeleteRequest, CreateTrackRequest, UpdateTrackRequest},
    },
    storage::Storage,
};

pub struct HttpServer {
    storage: Storage,
    uploads: UploadConfig,
    query: QueryConfig,
    pub config: HttpConfig,
}

#[derive(Serialize)]
struct ListResponse<'a> {
    data: &'a [Track],
    meta: ListMeta,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListMeta {
    total: usize,
    page: u32,
    limit: u32,
    total_pages: usize,
}

impl<'a> ListResponse<'a> {
    fn from_page(page: &'a Page<Track>) -> Self {
        Self {
            data: &page.items,
            meta: ListMeta {
                total: page.total,
                page: page.page,
                limit: page.limit,
                total_pages: page.total_pages,
            },
        }
    }
}

#[derive(Serialize)]
struct BatchDeleteResponse<'a> {
    success: &'a [String],
    failed: &'a [String],
}

struct UploadedFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

type HandlerResult = Result<Response, ApiError>;

impl HttpServer {
    pub fn new(
        storage: Storage,
        config: HttpConfig,
        uploads: UploadConfig,
        query: QueryConfig,
    ) -> Self {
        Self {
            storage,
            uploads,
            query,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let result = rouille::router!(request,
            (GET) (/api/genres) => {
                Ok(Response::json(&self.storage.genres.list()))
            },

            (GET) (/api/tracks) => {
                self.list_tracks(request)
            },
            (POST) (/api/tracks) => {
                self.create_track(request)
            },
            (POST) (/api/tracks/delete) => {
                self.delete_tracks(request)
            },
            (GET) (/api/tracks/{slug: String}) => {
                self.get_track(&slug)
            },
            (PUT) (/api/tracks/{id: String}) => {
                self.update_track(&id, request)
            },
            (DELETE) (/api/tracks/{id: String}) => {
                self.delete_track(&id)
            },

            (POST) (/api/tracks/{id: String}/upload) => {
                self.upload_file(&id, request)
            },
            (DELETE) (/api/tracks/{id: String}/file) => {
                self.delete_file(&id)
            },
            (GET) (/api/files/{name: String}) => {
                self.get_file(&name)
            },
            _ => Err(ApiError::NotFound(format!("no route for {} {}", request.method(), request.url())))
        );

        let response = result.unwrap_or_else(ApiError::into_response);
        info!("Response: {} {} {}", request.method(), request.url(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn parse_number(request: &Request, name: &str, default: u32) -> Result<u32, ApiError> {
        match request.get_param(name) {
            None => Ok(default),
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(ApiError::BadRequest(format!(
                    "{name} must be a positive integer"
                ))),
            },
        }
    }

    fn parse_query(&self, request: &Request) -> Result<TrackQuery, ApiError> {
        let text = |name: &str| request.get_param(name).filter(|v| !v.is_empty());
        let bad_request = |e: ParseQueryError| ApiError::BadRequest(e.to_string());

        Ok(TrackQuery {
            search: text("search"),
            genre: text("genre"),
            artist: text("artist"),
            sort: text("sort")
                .map(|s| s.parse::<SortField>())
                .transpose()
                .map_err(bad_request)?,
            order: text("order")
                .map(|s| s.parse::<SortOrder>())
                .transpose()
                .map_err(bad_request)?,
            page: Self::parse_number(request, "page", DEFAULT_PAGE)?,
            limit: Self::parse_number(request, "limit", DEFAULT_LIMIT)?
                .min(self.query.max_limit.max(1)),
        })
    }

    fn list_tracks(&self, request: &Request) -> HandlerResult {
        let query = self.parse_query(request)?;
        let page = self.storage.tracks.list(&query);
        Ok(Response::json(&ListResponse::from_page(&page)))
    }

    fn get_track(&self, slug: &str) -> HandlerResult {
        self.storage
            .tracks
            .get_by_slug(slug)
            .map(|track| Response::json(&track))
            .ok_or_else(|| ApiError::NotFound(format!("track '{slug}' not found")))
    }

    fn json_body<T: serde::de::DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
        rouille::input::json_input(request)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
    }

    /// Conflict if another track already uses the slug
    fn ensure_slug_free(&self, slug: &str, owner: Option<&str>) -> Result<(), ApiError> {
        match self.storage.tracks.get_by_slug(slug) {
            Some(existing) if Some(existing.id.as_str()) != owner => Err(ApiError::Conflict(
                format!("a track with slug '{slug}' already exists"),
            )),
            _ => Ok(()),
        }
    }

    fn slug_for(title: &str) -> Result<String, ApiError> {
        let slug = slugify(title);
        if slug.is_empty() {
            return Err(ApiError::BadRequest(
                "title must contain at least one letter or digit".into(),
            ));
        }
        Ok(slug)
    }

    fn create_track(&self, request: &Request) -> HandlerResult {
        let body: CreateTrackRequest = Self::json_body(request)?;
        let mut draft = body.into_draft(&self.storage.genres.list())?;
        draft.slug = Self::slug_for(&draft.title)?;
        self.ensure_slug_free(&draft.slug, None)?;

        let track = self.storage.tracks.create(draft)?;
        Ok(Response::json(&track).with_status_code(201))
    }

    fn update_track(&self, id: &str, request: &Request) -> HandlerResult {
        let existing = self
            .storage
            .tracks
            .get_by_id(id)
            .ok_or_else(|| ApiError::NotFound(format!("track {id} not found")))?;

        let body: UpdateTrackRequest = Self::json_body(request)?;
        let mut patch = body.into_patch(&self.storage.genres.list())?;

        if let Some(title) = &patch.title {
            let slug = Self::slug_for(title)?;
            if slug != existing.slug {
                self.ensure_slug_free(&slug, Some(id))?;
                patch.slug = Some(slug);
            }
        }

        self.storage
            .tracks
            .update(id, patch)
            .map(|track| Response::json(&track))
            .ok_or_else(|| ApiError::NotFound(format!("track {id} not found")))
    }

    fn delete_track(&self, id: &str) -> HandlerResult {
        if self.storage.tracks.delete(id) {
            Ok(Response::empty_204())
        } else {
            Err(ApiError::NotFound(format!("track {id} not found")))
        }
    }

    fn delete_tracks(&self, request: &Request) -> HandlerResult {
        let body: BatchDeleteRequest = Self::json_body(request)?;
        if body.ids.is_empty() {
            return Err(ApiError::BadRequest("ids must not be empty".into()));
        }

        let report = self.storage.tracks.delete_batch(&body.ids);
        Ok(Response::json(&BatchDeleteResponse {
            success: &report.succeeded,
            failed: &report.failed,
        }))
    }

    /// Reads the `file` field of a multipart form, at most `max_size` bytes
    fn read_upload(request: &Request, max_size: usize) -> Result<UploadedFile, ApiError> {
        let mut multipart = get_multipart_input(request)
            .map_err(|e| ApiError::BadRequest(format!("expected multipart form data: {e}")))?;

        while let Some(mut field) = multipart.next() {
            if &*field.headers.name != "file" {
                continue;
            }

            let file_name = field.headers.filename.clone().unwrap_or_default();
            let content_type = field
                .headers
                .content_type
                .as_ref()
                .map(|mime| mime.to_string())
                .unwrap_or_else(|| {
                    mime_guess::from_path(&file_name)
                        .first_or_octet_stream()
                        .to_string()
                });

            let mut bytes = Vec::new();
            (&mut field.data)
                .take(max_size as u64 + 1)
                .read_to_end(&mut bytes)
                .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
            if bytes.len() > max_size {
                return Err(ApiError::BadRequest(format!(
                    "file exceeds the maximum size of {max_size} bytes"
                )));
            }

            return Ok(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
        }

        Err(ApiError::BadRequest("missing 'file' field".into()))
    }

    fn check_content_type(&self, content_type: &str) -> Result<(), ApiError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if self.uploads.allowed_mime_types.contains(&essence) {
            Ok(())
        } else {
            Err(ApiError::BadRequest(format!(
                "unsupported file type '{essence}'"
            )))
        }
    }

    /// The stored file keeps the upload's extension, which decides how it is served later
    fn check_extension(&self, file_name: &str) -> Result<(), ApiError> {
        let served_as = Path::new(file_name)
            .extension()
            .and_then(|ext| Self::mime_from_ext(&ext.to_string_lossy().to_lowercase()));
        match served_as {
            Some(mime) if self.uploads.allowed_mime_types.contains(&mime) => Ok(()),
            _ => Err(ApiError::BadRequest(format!(
                "unsupported file extension in '{file_name}'"
            ))),
        }
    }

    fn upload_file(&self, id: &str, request: &Request) -> HandlerResult {
        if self.storage.tracks.get_by_id(id).is_none() {
            return Err(ApiError::NotFound(format!("track {id} not found")));
        }

        let upload = Self::read_upload(request, self.uploads.max_file_size)?;
        self.check_content_type(&upload.content_type)?;
        self.check_extension(&upload.file_name)?;

        self.storage
            .assets
            .attach(id, &upload.file_name, &upload.bytes)?
            .map(|track| Response::json(&track))
            .ok_or_else(|| ApiError::NotFound(format!("track {id} not found")))
    }

    fn delete_file(&self, id: &str) -> HandlerResult {
        if self.storage.assets.delete(id) {
            Ok(Response::empty_204())
        } else {
            Err(ApiError::NotFound(format!(
                "track {id} not found or has no audio file"
            )))
        }
    }

    fn get_file(&self, name: &str) -> HandlerResult {
        let path = self
            .storage
            .assets
            .resolve(name)
            .ok_or_else(|| ApiError::NotFound(format!("file {name} not found")))?;
        let file = std::fs::File::open(&path)
            .map_err(|_| ApiError::NotFound(format!("file {name} not found")))?;

        let mime = Self::mime_for_file(&path);
        log::debug!("FILE {name} -> 200 OK, MIME type: {mime}");
        Ok(Response::from_file(mime, file))
    }

    /// Only known audio types are served as such; anything else is an opaque download
    fn mime_for_file(path: &Path) -> String {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .and_then(|ext| Self::mime_from_ext(&ext))
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }

    /// Map file extension (without dot) to proper MIME type for browser playback.
    /// Returns None if the extension is not recognized.
    pub fn mime_from_ext(ext: &str) -> Option<String> {
        match ext {
            "m4a" => Some("audio/x-m4a".to_string()), // Safari iOS compatible
            "aac" => Some("audio/aac".to_string()),
            "mp3" => Some("audio/mpeg".to_string()),
            "wav" => Some("audio/wav".to_string()),
            "ogg" => Some("audio/ogg".to_string()),
            "flac" => Some("audio/flac".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
pub fn parse_json_response(response: rouille::Response) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    use rouille::Request;
    use serde_json::{Value, json};
    use tempfile::{TempDir, tempdir};

    fn create_server() -> anyhow::Result<(TempDir, HttpServer)> {
        let dir = tempdir()?;
        let storage = Storage::open(&StorageConfig::under(dir.path()))?;
        let server = HttpServer::new(
            storage,
            HttpConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8080,
            },
            UploadConfig {
                max_file_size: 16,
                ..Default::default()
            },
            QueryConfig { max_limit: 50 },
        );
        Ok((dir, server))
    }

    fn get(server: &HttpServer, url: &str) -> Response {
        server.handle_request(&Request::fake_http("GET", url, vec![], vec![]))
    }

    fn send_json(server: &HttpServer, method: &str, url: &str, body: Value) -> Response {
        let request = Request::fake_http(
            method,
            url,
            vec![("Content-Type".to_string(), "application/json".to_string())],
            body.to_string().into_bytes(),
        );
        server.handle_request(&request)
    }

    fn create_track(server: &HttpServer, title: &str, genres: &[&str]) -> anyhow::Result<Value> {
        let response = send_json(
            server,
            "POST",
            "/api/tracks",
            json!({ "title": title, "artist": "Test Artist", "genres": genres }),
        );
        assert_eq!(response.status_code, 201);
        parse_json_response(response)
    }

    fn multipart_upload(
        server: &HttpServer,
        id: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Response {
        let boundary = "XTRACKDECKBOUNDARY";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::fake_http(
            "POST",
            format!("/api/tracks/{id}/upload"),
            vec![(
                "Content-Type".to_string(),
                format!("multipart/form-data; boundary={boundary}"),
            )],
            body,
        );
        server.handle_request(&request)
    }

    #[test]
    fn test_http_genres() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;

        let response = get(&server, "/api/genres");

        assert_eq!(response.status_code, 200);
        let body = parse_json_response(response)?;
        assert_eq!(body.as_array().map(Vec::len), Some(13));
        assert_eq!(body[0], "Rock");
        Ok(())
    }

    #[test]
    fn test_http_create_and_get_by_slug() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;

        let created = create_track(&server, "Hello World", &["Pop"])?;
        assert_eq!(created["slug"], "hello-world");
        assert_eq!(created["createdAt"], created["updatedAt"]);

        let response = get(&server, "/api/tracks/hello-world");
        assert_eq!(response.status_code, 200);
        assert_eq!(parse_json_response(response)?, created);

        assert_eq!(get(&server, "/api/tracks/nope").status_code, 404);
        Ok(())
    }

    #[test]
    fn test_http_create_validation_and_conflict() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;
        create_track(&server, "Same Title", &[])?;

        let conflict = send_json(
            &server,
            "POST",
            "/api/tracks",
            json!({ "title": "same title!", "artist": "Other" }),
        );
        assert_eq!(conflict.status_code, 409);

        let unknown_genre = send_json(
            &server,
            "POST",
            "/api/tracks",
            json!({ "title": "x", "artist": "y", "genres": ["Polka"] }),
        );
        assert_eq!(unknown_genre.status_code, 400);

        let missing_artist = send_json(&server, "POST", "/api/tracks", json!({ "title": "x" }));
        assert_eq!(missing_artist.status_code, 400);
        let body = parse_json_response(missing_artist)?;
        assert!(body["error"].is_string());
        Ok(())
    }

    #[test]
    fn test_http_list_with_filters_and_pagination() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;
        for i in 0..5 {
            create_track(&server, &format!("Electro {i}"), &["Electronic"])?;
        }
        create_track(&server, "Guitar", &["Rock"])?;

        let response = get(&server, "/api/tracks?genre=Electronic&limit=2&sort=title");
        assert_eq!(response.status_code, 200);
        let body = parse_json_response(response)?;

        assert_eq!(body["meta"]["total"], 5);
        assert_eq!(body["meta"]["totalPages"], 3);
        assert_eq!(body["meta"]["page"], 1);
        assert_eq!(body["meta"]["limit"], 2);
        let titles: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Electro 0", "Electro 1"]);
        Ok(())
    }

    #[test]
    fn test_http_list_rejects_bad_parameters() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;

        for url in [
            "/api/tracks?page=0",
            "/api/tracks?limit=abc",
            "/api/tracks?sort=year",
            "/api/tracks?order=sideways",
        ] {
            assert_eq!(get(&server, url).status_code, 400, "{url}");
        }

        let capped = parse_json_response(get(&server, "/api/tracks?limit=1000"))?;
        assert_eq!(capped["meta"]["limit"], 50);
        Ok(())
    }

    #[test]
    fn test_http_update_recomputes_slug() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;
        let created = create_track(&server, "Old Name", &[])?;
        create_track(&server, "Taken", &[])?;
        let id = created["id"].as_str().unwrap();

        let response = send_json(
            &server,
            "PUT",
            &format!("/api/tracks/{id}"),
            json!({ "title": "New Name", "album": "Record" }),
        );
        assert_eq!(response.status_code, 200);
        let updated = parse_json_response(response)?;
        assert_eq!(updated["slug"], "new-name");
        assert_eq!(updated["album"], "Record");
        assert_eq!(updated["artist"], "Test Artist");

        let conflict = send_json(
            &server,
            "PUT",
            &format!("/api/tracks/{id}"),
            json!({ "title": "Taken" }),
        );
        assert_eq!(conflict.status_code, 409);

        let missing = send_json(&server, "PUT", "/api/tracks/unknown", json!({ "title": "x" }));
        assert_eq!(missing.status_code, 404);
        Ok(())
    }

    #[test]
    fn test_http_delete_and_batch_delete() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;
        let a = create_track(&server, "A", &[])?;
        let b = create_track(&server, "B", &[])?;
        let c = create_track(&server, "C", &[])?;
        let id = |t: &Value| t["id"].as_str().unwrap().to_string();

        let response = server.handle_request(&Request::fake_http(
            "DELETE",
            format!("/api/tracks/{}", id(&a)),
            vec![],
            vec![],
        ));
        assert_eq!(response.status_code, 204);

        let response = send_json(
            &server,
            "POST",
            "/api/tracks/delete",
            json!({ "ids": [id(&b), id(&a), id(&c), id(&c)] }),
        );
        assert_eq!(response.status_code, 200);
        let body = parse_json_response(response)?;
        assert_eq!(body["success"], json!([id(&b), id(&c)]));
        assert_eq!(body["failed"], json!([id(&a), id(&c)]));

        let empty = send_json(&server, "POST", "/api/tracks/delete", json!({ "ids": [] }));
        assert_eq!(empty.status_code, 400);
        Ok(())
    }

    #[test]
    fn test_http_upload_serve_and_remove_file() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;
        let created = create_track(&server, "With Audio", &[])?;
        let id = created["id"].as_str().unwrap();

        let response = multipart_upload(&server, id, "take.mp3", "audio/mpeg", b"ID3abc");
        assert_eq!(response.status_code, 200);
        let updated = parse_json_response(response)?;
        let audio_file = format!("{id}.mp3");
        assert_eq!(updated["audioFile"], audio_file.as_str());

        let response = get(&server, &format!("/api/files/{audio_file}"));
        assert_eq!(response.status_code, 200);
        let mut body = Vec::new();
        response
            .data
            .into_reader_and_size()
            .0
            .read_to_end(&mut body)?;
        assert_eq!(body, b"ID3abc");

        let response = server.handle_request(&Request::fake_http(
            "DELETE",
            format!("/api/tracks/{id}/file"),
            vec![],
            vec![],
        ));
        assert_eq!(response.status_code, 204);
        assert_eq!(get(&server, &format!("/api/files/{audio_file}")).status_code, 404);

        let again = server.handle_request(&Request::fake_http(
            "DELETE",
            format!("/api/tracks/{id}/file"),
            vec![],
            vec![],
        ));
        assert_eq!(again.status_code, 404);
        Ok(())
    }

    #[test]
    fn test_http_upload_validation() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;
        let created = create_track(&server, "Strict", &[])?;
        let id = created["id"].as_str().unwrap();

        let wrong_type = multipart_upload(&server, id, "cover.png", "image/png", b"PNG");
        assert_eq!(wrong_type.status_code, 400);

        let too_big = multipart_upload(&server, id, "long.mp3", "audio/mpeg", &[0u8; 64]);
        assert_eq!(too_big.status_code, 400);

        let html_as_audio = multipart_upload(
            &server,
            id,
            "x.html",
            "audio/mpeg",
            b"<script>alert(1)</script>",
        );
        assert_eq!(html_as_audio.status_code, 400);
        assert_eq!(get(&server, &format!("/api/files/{id}.html")).status_code, 404);

        let no_extension = multipart_upload(&server, id, "take", "audio/mpeg", b"ID3");
        assert_eq!(no_extension.status_code, 400);

        let no_track = multipart_upload(&server, "missing", "a.mp3", "audio/mpeg", b"ID3");
        assert_eq!(no_track.status_code, 404);

        let not_multipart = send_json(
            &server,
            "POST",
            &format!("/api/tracks/{id}/upload"),
            json!({}),
        );
        assert_eq!(not_multipart.status_code, 400);
        Ok(())
    }

    #[test]
    fn test_http_unknown_route() -> anyhow::Result<()> {
        let (_dir, server) = create_server()?;
        assert_eq!(get(&server, "/nowhere").status_code, 404);
        Ok(())
    }

    #[test]
    fn test_mime_for_file() {
        assert_eq!(HttpServer::mime_for_file(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(HttpServer::mime_for_file(Path::new("a.M4A")), "audio/x-m4a");
        assert_eq!(
            HttpServer::mime_for_file(Path::new("a.unknownext")),
            "application/octet-stream"
        );
        assert_eq!(
            HttpServer::mime_for_file(Path::new("a.html")),
            "application/octet-stream"
        );
        assert_eq!(HttpServer::mime_for_file(Path::new("noext")), "application/octet-stream");
    }
}
