/*
 * Created on Wed Feb 28 2024
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

//! The environment layer: beaten by the CLI, beats the defaults

use super::Configset;
use std::env;

pub fn parse_env(configset: &mut Configset) {
    let mut host = configset.cfg.host;
    configset.try_mutate(env::var("CRIMSON_HOST"), &mut host, "CRIMSON_HOST");
    configset.cfg.host = host;
    let mut port = configset.cfg.port;
    configset.try_mutate(env::var("CRIMSON_PORT"), &mut port, "CRIMSON_PORT");
    configset.cfg.port = port;
    configset.try_mutate_master(env::var("CRIMSON_REPLICAOF"), "CRIMSON_REPLICAOF");
    let mut dir = configset.cfg.snapshot.dir.clone();
    configset.try_mutate(env::var("CRIMSON_DIR"), &mut dir, "CRIMSON_DIR");
    configset.cfg.snapshot.dir = dir;
    let mut file = configset.cfg.snapshot.file.clone();
    configset.try_mutate(
        env::var("CRIMSON_DBFILENAME"),
        &mut file,
        "CRIMSON_DBFILENAME",
    );
    configset.cfg.snapshot.file = file;
}
