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

//! The command-line layer: the highest-priority configuration source

use super::Configset;
use clap::{Arg, ArgMatches, Command};

pub fn build() -> Command {
    Command::new("crimsond")
        .version(libcrimson::VERSION)
        .about("Crimson: an in-memory data structure server")
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("The IP address to listen on"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("The TCP port to listen on"),
        )
        .arg(
            Arg::new("replicaof")
                .long("replicaof")
                .value_name("\"HOST PORT\"")
                .help("Run as a follower of the given primary"),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .value_name("PATH")
                .help("The directory holding the snapshot file"),
        )
        .arg(
            Arg::new("dbfilename")
                .long("dbfilename")
                .value_name("FILE")
                .help("The snapshot file name"),
        )
}

pub fn parse_cli_args(configset: &mut Configset, matches: &ArgMatches) {
    let of = |key: &str| matches.get_one::<String>(key).map(String::as_str);
    let mut host = configset.cfg.host;
    configset.try_mutate(of("host"), &mut host, "--host");
    configset.cfg.host = host;
    let mut port = configset.cfg.port;
    configset.try_mutate(of("port"), &mut port, "--port");
    configset.cfg.port = port;
    configset.try_mutate_master(of("replicaof"), "--replicaof");
    let mut dir = configset.cfg.snapshot.dir.clone();
    configset.try_mutate(of("dir"), &mut dir, "--dir");
    configset.cfg.snapshot.dir = dir;
    let mut file = configset.cfg.snapshot.file.clone();
    configset.try_mutate(of("dbfilename"), &mut file, "--dbfilename");
    configset.cfg.snapshot.file = file;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_everything() {
        let matches = build().get_matches_from([
            "crimsond",
            "--port",
            "7878",
            "--replicaof",
            "10.0.0.1 6379",
            "--dir",
            "/var/lib/crimson",
            "--dbfilename",
            "data.rdb",
        ]);
        let mut configset = Configset::new();
        parse_cli_args(&mut configset, &matches);
        assert!(configset.is_okay());
        assert_eq!(configset.cfg.port, 7878);
        assert_eq!(configset.cfg.master, Some(("10.0.0.1".to_owned(), 6379)));
        assert_eq!(configset.cfg.snapshot.dir, "/var/lib/crimson");
        assert_eq!(configset.cfg.snapshot.file, "data.rdb");
    }
}
