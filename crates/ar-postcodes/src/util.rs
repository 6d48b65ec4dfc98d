pub fn default_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().gzip(true).brotli(true).build()
}
