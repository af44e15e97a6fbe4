//! SOAP transport adapter for the secret server web service.
//!
//! Exactly two operations are spoken: `Authenticate`, which trades
//! credentials for a session token, and `GetSecret`, which fetches one
//! secret by id. Requests are hand-built SOAP 1.1 envelopes POSTed to
//! the service endpoint (the WSDL URL with its query stripped);
//! responses are read with `roxmltree`. The token is fetched on first
//! use and cached, so a whole batch authenticates once.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use roxmltree::{Document, Node};
use secretr_core::config::ConnectionConfig;
use secretr_core::error::SourceError;
use secretr_core::secret::{SecretField, SecretRecord};
use secretr_core::source::SecretSource;
use tokio::sync::Mutex;

const AUTHENTICATE_ACTION: &str = "\"urn:thesecretserver.com/Authenticate\"";
const GET_SECRET_ACTION: &str = "\"urn:thesecretserver.com/GetSecret\"";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ── Client ───────────────────────────────────────────────────────────

/// One connection to a secret server.
pub struct SoapClient {
    http: reqwest::Client,
    endpoint: String,
    config: ConnectionConfig,
    /// Session token, filled by the first fetch that needs it. The
    /// lock is held across authentication so concurrent fetches wait
    /// for one token instead of racing their own.
    token_cache: Mutex<Option<String>>,
}

impl SoapClient {
    /// Build a client for the given connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Transport`] when the HTTP client cannot
    /// be constructed.
    pub fn new(config: ConnectionConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        let endpoint = service_endpoint(&config.wsdl_url);

        Ok(Self {
            http,
            endpoint,
            config,
            token_cache: Mutex::new(None),
        })
    }

    async fn token(&self) -> Result<String, SourceError> {
        let mut cached = self.token_cache.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let xml = self
            .call(AUTHENTICATE_ACTION, authenticate_envelope(&self.config))
            .await?;
        let token = parse_token(&xml)?;
        tracing::debug!(endpoint = %self.endpoint, "authenticated against secret server");

        *cached = Some(token.clone());
        Ok(token)
    }

    async fn call(&self, action: &str, envelope: String) -> Result<String, SourceError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", action)
            .body(envelope)
            .send()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;

        if !status.is_success() {
            if let Some(fault) = fault_string(&text) {
                return Err(SourceError::Server(fault));
            }
            return Err(SourceError::Transport(format!("server returned {status}")));
        }
        Ok(text)
    }
}

#[async_trait]
impl SecretSource for SoapClient {
    async fn fetch(&self, id: &str) -> Result<SecretRecord, SourceError> {
        let token = self.token().await?;
        let xml = self
            .call(GET_SECRET_ACTION, get_secret_envelope(&token, id))
            .await?;
        parse_secret(&xml)
    }
}

// ── Request envelopes ────────────────────────────────────────────────

fn service_endpoint(wsdl_url: &str) -> String {
    wsdl_url
        .split_once('?')
        .map_or(wsdl_url, |(base, _)| base)
        .to_owned()
}

fn authenticate_envelope(config: &ConnectionConfig) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><Authenticate xmlns="urn:thesecretserver.com"><username>{username}</username><password>{password}</password><organization>{organization}</organization><domain>{domain}</domain></Authenticate></soap:Body></soap:Envelope>"#,
        username = xml_escape(&config.username),
        password = xml_escape(&config.password),
        organization = xml_escape(&config.organization),
        domain = xml_escape(&config.domain),
    )
}

fn get_secret_envelope(token: &str, id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><GetSecret xmlns="urn:thesecretserver.com"><token>{token}</token><secretId>{id}</secretId></GetSecret></soap:Body></soap:Envelope>"#,
        token = xml_escape(token),
        id = xml_escape(id),
    )
}

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

// ── Response parsing ─────────────────────────────────────────────────
//
// Elements are matched by local name only: the service mixes its own
// namespace with the SOAP envelope's, and the names are unambiguous.

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.tag_name().name() == name)
        .and_then(|child| child.text())
}

/// The `<string>` messages under a node's `Errors` element, if any.
fn error_strings(node: Node<'_, '_>) -> Vec<String> {
    node.children()
        .find(|child| child.tag_name().name() == "Errors")
        .map(|errors| {
            errors
                .children()
                .filter(Node::is_element)
                .filter_map(|entry| entry.text())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn fault_string(xml: &str) -> Option<String> {
    let doc = Document::parse(xml).ok()?;
    doc.descendants()
        .find(|node| node.tag_name().name() == "faultstring")
        .and_then(|node| node.text())
        .map(ToOwned::to_owned)
}

fn parse_token(xml: &str) -> Result<String, SourceError> {
    let doc = Document::parse(xml)
        .map_err(|err| SourceError::Protocol(format!("unparseable authenticate response: {err}")))?;
    let result = doc
        .descendants()
        .find(|node| node.tag_name().name() == "AuthenticateResult")
        .ok_or_else(|| {
            SourceError::Protocol("authenticate response has no AuthenticateResult".to_owned())
        })?;

    let errors = error_strings(result);
    if !errors.is_empty() {
        return Err(SourceError::Auth(errors.join("; ")));
    }

    match child_text(result, "Token") {
        Some(token) if !token.is_empty() => Ok(token.to_owned()),
        _ => Err(SourceError::Protocol(
            "authenticate response has no token".to_owned(),
        )),
    }
}

fn parse_secret(xml: &str) -> Result<SecretRecord, SourceError> {
    let doc = Document::parse(xml)
        .map_err(|err| SourceError::Protocol(format!("unparseable secret response: {err}")))?;
    let result = doc
        .descendants()
        .find(|node| node.tag_name().name() == "GetSecretResult")
        .ok_or_else(|| SourceError::Protocol("response has no GetSecretResult".to_owned()))?;

    let errors = error_strings(result);
    if !errors.is_empty() {
        return Err(SourceError::Server(errors.join("; ")));
    }

    let secret = result
        .children()
        .find(|node| node.tag_name().name() == "Secret")
        .ok_or_else(|| SourceError::Protocol("response has no Secret element".to_owned()))?;

    // The secret's own Id is a direct child; items carry their own Id
    // elements, so a descendant search would pick up the wrong one.
    let id = child_text(secret, "Id")
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| SourceError::Protocol("secret has no numeric Id".to_owned()))?;
    let name = child_text(secret, "Name").unwrap_or_default().to_owned();

    let mut items = BTreeMap::new();
    if let Some(list) = secret
        .children()
        .find(|node| node.tag_name().name() == "Items")
    {
        for item in list
            .children()
            .filter(|node| node.tag_name().name() == "SecretItem")
        {
            let field = SecretField {
                id: child_text(item, "Id").and_then(|text| text.parse().ok()),
                field_id: child_text(item, "FieldId").and_then(|text| text.parse().ok()),
                field_name: child_text(item, "FieldName").unwrap_or_default().to_owned(),
                value: child_text(item, "Value").unwrap_or_default().to_owned(),
                is_file: child_text(item, "IsFile") == Some("true"),
                is_notes: child_text(item, "IsNotes") == Some("true"),
                is_password: child_text(item, "IsPassword") == Some("true"),
            };
            items.insert(field.field_name.clone(), field);
        }
    }

    Ok(SecretRecord { id, name, items })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const AUTH_OK: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <AuthenticateResponse xmlns="urn:thesecretserver.com">
      <AuthenticateResult>
        <Errors />
        <Token>session-token-123</Token>
      </AuthenticateResult>
    </AuthenticateResponse>
  </soap:Body>
</soap:Envelope>"#;

    const AUTH_FAILED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <AuthenticateResponse xmlns="urn:thesecretserver.com">
      <AuthenticateResult>
        <Errors><string>Login failed.</string></Errors>
        <Token />
      </AuthenticateResult>
    </AuthenticateResponse>
  </soap:Body>
</soap:Envelope>"#;

    const SECRET_OK: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetSecretResponse xmlns="urn:thesecretserver.com">
      <GetSecretResult>
        <Errors />
        <Secret>
          <Name>db credentials</Name>
          <Items>
            <SecretItem>
              <Value>svc-app</Value>
              <Id>501</Id>
              <FieldId>11</FieldId>
              <FieldName>Username</FieldName>
              <IsFile>false</IsFile>
              <IsNotes>false</IsNotes>
              <IsPassword>false</IsPassword>
            </SecretItem>
            <SecretItem>
              <Value>hunter2</Value>
              <Id>502</Id>
              <FieldId>12</FieldId>
              <FieldName>Password</FieldName>
              <IsFile>false</IsFile>
              <IsNotes>false</IsNotes>
              <IsPassword>true</IsPassword>
            </SecretItem>
            <SecretItem>
              <Value />
              <Id>503</Id>
              <FieldId>13</FieldId>
              <FieldName>Notes</FieldName>
              <IsFile>false</IsFile>
              <IsNotes>true</IsNotes>
              <IsPassword>false</IsPassword>
            </SecretItem>
          </Items>
          <Id>101</Id>
          <SecretTypeId>2</SecretTypeId>
        </Secret>
      </GetSecretResult>
    </GetSecretResponse>
  </soap:Body>
</soap:Envelope>"#;

    const SECRET_DENIED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetSecretResponse xmlns="urn:thesecretserver.com">
      <GetSecretResult>
        <Errors><string>Access Denied</string></Errors>
      </GetSecretResult>
    </GetSecretResponse>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn parses_token_from_authenticate_response() {
        assert_eq!(parse_token(AUTH_OK).unwrap(), "session-token-123");
    }

    #[test]
    fn login_failure_is_an_auth_error() {
        let err = parse_token(AUTH_FAILED).unwrap_err();
        assert!(matches!(err, SourceError::Auth(_)));
        assert!(err.to_string().contains("Login failed."));
    }

    #[test]
    fn garbage_response_is_a_protocol_error() {
        assert!(matches!(
            parse_token("not xml at all").unwrap_err(),
            SourceError::Protocol(_)
        ));
        assert!(matches!(
            parse_secret("<other />").unwrap_err(),
            SourceError::Protocol(_)
        ));
    }

    #[test]
    fn parses_secret_with_items_keyed_by_field_name() {
        let record = parse_secret(SECRET_OK).unwrap();
        assert_eq!(record.id, 101);
        assert_eq!(record.name, "db credentials");
        assert_eq!(record.items.len(), 3);

        let password = &record.items["Password"];
        assert_eq!(password.value, "hunter2");
        assert_eq!(password.id, Some(502));
        assert_eq!(password.field_id, Some(12));
        assert!(password.is_password);
        assert!(!password.is_file);

        // Empty <Value /> elements read back as empty strings.
        assert_eq!(record.items["Notes"].value, "");
        assert!(record.items["Notes"].is_notes);
    }

    #[test]
    fn server_reported_errors_become_server_errors() {
        let err = parse_secret(SECRET_DENIED).unwrap_err();
        assert!(matches!(err, SourceError::Server(_)));
        assert_eq!(err.to_string(), "Access Denied");
    }

    #[test]
    fn endpoint_strips_the_query_string() {
        assert_eq!(
            service_endpoint("http://host/path/SSWebService.asmx?WSDL"),
            "http://host/path/SSWebService.asmx"
        );
        assert_eq!(
            service_endpoint("http://host/path/SSWebService.asmx"),
            "http://host/path/SSWebService.asmx"
        );
    }

    #[test]
    fn envelopes_escape_credential_text() {
        let config = ConnectionConfig {
            wsdl_url: "http://host/SSWebService.asmx?WSDL".to_owned(),
            username: "user&name".to_owned(),
            password: "p<w>d\"q'".to_owned(),
            organization: String::new(),
            domain: "corp".to_owned(),
        };
        let envelope = authenticate_envelope(&config);

        assert!(envelope.contains("<username>user&amp;name</username>"));
        assert!(envelope.contains("<password>p&lt;w&gt;d&quot;q&apos;</password>"));
        assert!(envelope.contains("<organization></organization>"));
        assert!(envelope.contains("<domain>corp</domain>"));
    }

    #[test]
    fn soap_fault_text_is_extracted() {
        let fault = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:Server</faultcode>
      <faultstring>Server was unable to process request.</faultstring>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;
        assert_eq!(
            fault_string(fault).as_deref(),
            Some("Server was unable to process request.")
        );
        assert!(fault_string("<ok />").is_none());
    }
}
