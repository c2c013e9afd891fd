/*
 * Created on Thu Feb 29 2024
 *
 * This file is a part of Crimson
 * Crimson is a free and open-source in-memory data structure server written
 * by Sayan Nandan ("the Author") with the vision to provide a compact,
 * protocol-compatible store for strings, lists and streams.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Crimson
//!
//! The `crimsond` crate is Crimson's server: an in-memory store for strings,
//! lists and streams behind a length-prefixed text protocol, with follower
//! replication and binary snapshot loading. See the module docs for the
//! individual subsystems.

use crate::config::ConfigurationSet;
use crate::queryengine::Services;
use crate::replication::{ReplicationState, Role};
use env_logger::Builder;
use libcrimson::{TResult, URL, VERSION};
use std::env;
use tokio::sync::broadcast;

mod util;
mod actions;
mod blocking;
mod config;
mod corestore;
mod dbnet;
mod diskstore;
mod protocol;
mod queryengine;
mod replication;
mod resp;
#[cfg(test)]
mod tests;

use corestore::Corestore;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - this is the default memory allocator for platforms other than msvc
static GLOBAL: Jemalloc = Jemalloc;

/// The terminal art for `!CRIMSON_NOART` configurations
static TEXT: &str = "\n ██████ ██████  ██ ███    ███ ███████  ██████  ███    ██ \n██      ██   ██ ██ ████  ████ ██      ██    ██ ████   ██ \n██      ██████  ██ ██ ████ ██ ███████ ██    ██ ██ ██  ██ \n██      ██   ██ ██ ██  ██  ██      ██ ██    ██ ██  ██ ██ \n ██████ ██   ██ ██ ██      ██ ███████  ██████  ██   ████ \n";

fn main() {
    Builder::new()
        .parse_filters(&env::var("CRIMSON_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    if env::var_os("CRIMSON_NOART").is_none() {
        println!("{TEXT}");
    }
    log::info!("Crimson v{VERSION} | {URL}");
    let cfg = config::get_config_or_exit();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("server")
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            log::error!("failed to build the runtime: {e}");
            util::exit_error()
        });
    if let Err(e) = runtime.block_on(run(cfg)) {
        log::error!("server failed with: {e}");
        util::exit_error();
    }
    log::info!("goodbye");
}

async fn run(cfg: ConfigurationSet) -> TResult<()> {
    let db = Corestore::new();
    let role = match &cfg.master {
        Some((host, port)) => Role::Follower {
            host: host.clone(),
            port: *port,
        },
        None => Role::Primary,
    };
    let repl = ReplicationState::new(role);
    let svc = Services {
        db: db.clone(),
        repl: repl.clone(),
        snapshot: cfg.snapshot.clone(),
        port: cfg.port,
    };

    match diskstore::load_from_file(&db, &cfg.snapshot.dir, &cfg.snapshot.file) {
        Ok(Some(stats)) => log::info!(
            "snapshot loaded: {} keys ({} expired, {} skipped)",
            stats.keys,
            stats.expired,
            stats.skipped
        ),
        Ok(None) => log::debug!("no snapshot file, starting empty"),
        Err(e) => log::warn!("snapshot load failed ({e}), starting empty"),
    }

    let (signal, _) = broadcast::channel(1);
    if !repl.is_primary() {
        // the follower side of the replication pipeline lives in its own task
        tokio::spawn(replication::follower::run(svc.clone()));
    }
    let mut listener = dbnet::connect(
        &svc,
        cfg.host,
        cfg.port,
        dbnet::MAXIMUM_CONNECTION_LIMIT,
        signal.clone(),
    )
    .await?;

    tokio::select! {
        _ = listener.run() => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("got a termination signal, draining sessions");
        }
    }
    let _ = signal.send(());
    listener.base.release_self().await;
    Ok(())
}
