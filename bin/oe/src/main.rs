// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of OpenEthereum.

// OpenEthereum is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// OpenEthereum is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with OpenEthereum.  If not, see <http://www.gnu.org/licenses/>.

//! Minimal demonstration node for the client core: opens a `Client` over the
//! in-memory reference `Chain`/`StateDB`/`Network`/`Crypto`/`Compiler`
//! (spec.md §6), submits one local transaction, installs a watch on its
//! sender, flushes the pending set, and prints what the filter observed.
//! Scaled-down analogue of `parity/main.rs` for this crate's narrower scope:
//! same `clap` + `env_logger` shape, no RPC/network servers.

use std::{path::PathBuf, process};

use clap::{App, Arg};

use client_core::{
    external::{InMemoryChain, InMemoryStateDb, NullCompiler, ToyCrypto},
    Client, ClientConfig,
};
use client_types::{Address, Block, Bloom, Filter, Header, Hash, U256};

fn genesis() -> Block {
    Block {
        header: Header {
            parent_hash: Hash::zero(),
            state_root: Hash::zero(),
            timestamp: 0,
            number: 0,
            difficulty: U256::zero(),
            bloom: Bloom::default(),
            nonce: 0,
        },
        transactions: Vec::new(),
    }
}

fn parse_address(raw: &str) -> Result<Address, String> {
    raw.parse::<u64>()
        .map(Address::from_low_u64_be)
        .map_err(|e| format!("expected a small integer standing in for an address: {}", e))
}

fn run() -> Result<(), String> {
    let matches = App::new("oe")
        .about("client-core demonstration node")
        .arg(Arg::with_name("db-path").long("db-path").takes_value(true).default_value(".oe-demo"))
        .arg(Arg::with_name("coinbase").long("coinbase").takes_value(true).default_value("1"))
        .arg(Arg::with_name("from").long("from").takes_value(true).default_value("1"))
        .arg(Arg::with_name("to").long("to").takes_value(true).default_value("2"))
        .arg(Arg::with_name("value").long("value").takes_value(true).default_value("10"))
        .arg(Arg::with_name("mine").long("mine").help("start the miner before flushing"))
        .get_matches();

    let db_path: PathBuf = matches.value_of("db-path").unwrap().into();
    let coinbase = parse_address(matches.value_of("coinbase").unwrap())?;
    let from = parse_address(matches.value_of("from").unwrap())?;
    let to = parse_address(matches.value_of("to").unwrap())?;
    let value = U256::from_dec_str(matches.value_of("value").unwrap())
        .map_err(|e| format!("bad --value: {:?}", e))?;

    let client = Client::new(
        ClientConfig::default(),
        &db_path,
        coinbase,
        Box::new(InMemoryChain::new(genesis())),
        Box::new(InMemoryStateDb::default()),
        Box::new(ToyCrypto),
        Box::new(NullCompiler),
    )
    .map_err(|e| format!("failed to open client: {}", e))?;

    let mut watch_filter = Filter::default();
    watch_filter.from.insert(from);
    let watch_id = client.install_watch(watch_filter);

    let tx_hash = client.transact(&from, value, to, Vec::new(), U256::from(21_000), U256::from(1));
    log::info!(target: "oe", "submitted transaction {:?}", tx_hash);

    if matches.is_present("mine") {
        client.start_mining();
    }
    client.flush_transactions();

    println!("balance of {:?} in post-mine state: {}", to, client.balance_at(client_types::BlockSelector::Post, &to).unwrap_or_default());
    println!("watch fired: {}", client.check_watch(watch_id));

    client.shutdown();
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}
