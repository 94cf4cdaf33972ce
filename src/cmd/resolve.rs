use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use chanres::stream::auth::{AnonymousTokenAuth, AuthProvider, CognitoIdp, SessionAuth};
use chanres::stream::providers::{dplay, goplay};
use chanres::stream::request_for_url;
use chanres::token_store;
use chanres::{
    Channel, HttpFetcher, PayloadFetcher, ResolutionRequest, ResolutionResult, ResolverConfig,
    StreamResolver, TokenStore,
};

/// Output and preference switches of `chanres resolve`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveFlags {
    pub json: bool,
    pub no_widevine: bool,
    pub probe: bool,
}

pub async fn cmd_resolve(
    url: &str,
    channel: Option<&str>,
    flags: ResolveFlags,
    config_path: Option<&Path>,
) -> Result<()> {
    let channel = match channel {
        Some(name) => Channel::from_name(name)
            .with_context(|| format!("unknown channel {name:?}, see `chanres channels`"))?,
        None => Channel::detect(url)
            .with_context(|| format!("no channel handles {url}, pass --channel"))?,
    };

    let mut config = match config_path {
        Some(path) => ResolverConfig::load_from(path),
        None => ResolverConfig::load(),
    }
    .context("failed to load configuration")?;
    if flags.no_widevine {
        config.prefer_widevine = false;
    }
    if flags.probe {
        config.probe_manifests = true;
    }

    let fetcher: Arc<dyn PayloadFetcher> = Arc::new(HttpFetcher::new(&config)?);

    let request = request_for_url(fetcher.as_ref(), channel, url)
        .await
        .with_context(|| format!("failed to recover a playback URL from {url}"))?;

    let mut store = TokenStore::load(&token_store::default_path())
        .context("failed to load stored tokens")?;
    let session = session_for(channel, &fetcher, &config, &store);

    let mut resolver = StreamResolver::new(fetcher.clone(), config.resolver_options());
    if let Some(auth) = auth_for(channel, &fetcher, session.as_ref()) {
        resolver = resolver.with_auth(auth);
    }

    let result = resolver
        .resolve(&request)
        .await
        .with_context(|| format!("failed to resolve {}", request.resolve_url))?;

    if let Some(session) = &session {
        persist_refresh_token(channel, session, &mut store).await;
    }

    if flags.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(channel, &request, &result);
    }

    Ok(())
}

/// Cognito session for channels with account logins. A refresh token from
/// an earlier run wins over the configured one, being newer.
fn session_for(
    channel: Channel,
    fetcher: &Arc<dyn PayloadFetcher>,
    config: &ResolverConfig,
    store: &TokenStore,
) -> Option<Arc<SessionAuth>> {
    match channel {
        Channel::GoPlay => {
            let idp = CognitoIdp::new(
                fetcher.clone(),
                goplay::COGNITO_POOL_ID,
                goplay::COGNITO_CLIENT_ID,
            );
            let mut credentials = config.credentials_for(channel);
            if let Some(stored) = store.refresh_token(channel) {
                credentials.refresh_token = Some(stored.to_string());
            }
            Some(Arc::new(SessionAuth::new(Arc::new(idp), credentials)))
        }
        Channel::Dplay | Channel::VrtNu | Channel::Kijk => None,
    }
}

fn auth_for(
    channel: Channel,
    fetcher: &Arc<dyn PayloadFetcher>,
    session: Option<&Arc<SessionAuth>>,
) -> Option<Arc<dyn AuthProvider>> {
    match channel {
        Channel::Dplay => Some(Arc::new(AnonymousTokenAuth::new(
            fetcher.clone(),
            dplay::TOKEN_URL,
        ))),
        _ => session.map(|session| session.clone() as Arc<dyn AuthProvider>),
    }
}

async fn persist_refresh_token(channel: Channel, session: &SessionAuth, store: &mut TokenStore) {
    let Some(token) = session.refresh_token().await else {
        return;
    };
    if !store.set_refresh_token(channel, &token) {
        return;
    }
    match store.save() {
        Ok(()) => debug!(%channel, "Stored rotated refresh token"),
        Err(e) => warn!(%channel, error = %e, "Could not store refresh token"),
    }
}

fn print_result(channel: Channel, request: &ResolutionRequest, result: &ResolutionResult) {
    println!("🎬 {} item {}", channel.description(), request.item_id);
    println!("🔗 {}", request.resolve_url);

    if result.drm_required {
        println!("🔒 DRM protected");
        if let Some(key) = &result.drm_key {
            println!("   key: {key}");
        }
    }
    if result.geo_locked {
        println!("🌍 Geo-locked");
    }
    if let Some(reason) = &result.deferred_reason {
        println!("⏸️  Deferred: {reason}");
    }

    let best = result.best();
    for candidate in &result.candidates {
        let marker = if best.is_some_and(|b| std::ptr::eq(b, candidate)) {
            "★"
        } else {
            " "
        };
        println!(
            "{marker} {:<4} {:>5}  {}",
            candidate.protocol.to_string(),
            candidate.weight,
            candidate.url
        );
        for variant in &candidate.variants {
            println!("        {:>6} kbps  {}", variant.bandwidth / 1000, variant.url);
        }
        if let Some(audio) = &candidate.audio_url {
            println!("        audio  {audio}");
        }
        if let Some(subtitle) = &candidate.subtitle_url {
            println!("        subs   {subtitle}");
        }
        if let Some(license) = &candidate.license_url {
            println!("        lic    {license}");
        }
        if candidate.license_token.is_some() {
            println!("        lic    play token attached");
        }
    }

    if result.complete {
        println!("✅ {} candidate(s)", result.candidates.len());
    }
}
