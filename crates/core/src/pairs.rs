//! Pair identifier translation
//!
//! Both feeds name pairs differently:
//! - the push feed sends a packed short string (`"BTC/USD"` as a big-endian integer)
//! - the stream feed sends a 32-byte price feed hash
//!
//! Both translators emit the same `BASE/QUOTE` canonical symbol so that the
//! reconciler can join them.

use alloy_primitives::{hex, B256, U256};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::{CanonicalSymbol, DecodeError, DecodeResult};

/// Maximum length of a packed short string
pub const SHORT_STRING_MAX_LEN: usize = 31;

/// Decode a packed short string, given as `0x`-prefixed hex or a decimal integer.
pub fn decode_short_string(packed: &str) -> DecodeResult<String> {
    let packed = packed.trim();
    let value = match packed.strip_prefix("0x").or_else(|| packed.strip_prefix("0X")) {
        Some(digits) => U256::from_str_radix(digits, 16),
        None => U256::from_str_radix(packed, 10),
    }
    .map_err(|e| DecodeError::InvalidShortString(format!("{packed}: {e}")))?;

    let bytes = value.to_be_bytes::<32>();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let text = &bytes[start..];

    if text.len() > SHORT_STRING_MAX_LEN {
        return Err(DecodeError::InvalidShortString(format!(
            "{packed}: {} bytes exceeds {SHORT_STRING_MAX_LEN}",
            text.len()
        )));
    }
    if !text.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return Err(DecodeError::InvalidShortString(format!("{packed}: not printable ASCII")));
    }

    Ok(text.iter().map(|b| *b as char).collect())
}

/// Translate a push feed asset id into its canonical symbol.
pub fn push_pair_symbol(global_asset_id: &str) -> DecodeResult<CanonicalSymbol> {
    let decoded = decode_short_string(global_asset_id)?;
    CanonicalSymbol::parse(&decoded).ok_or(DecodeError::InvalidSymbol(decoded))
}

/// Tracked stream feed identifiers: (hash, concatenated symbol)
const STREAM_FEED_IDS: &[(&str, &str)] = &[
    ("e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43", "BTCUSD"),
    ("ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace", "ETHUSD"),
    ("ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d", "SOLUSD"),
    ("2f95862b045670cd22bee3114c39763a4a08beeb663b145d283c31d7d1101c4f", "BNBUSD"),
    ("6e3f3fa8253588df9326580180233eb791e03b443a3ba7a1d892e73874e19a54", "LTCUSD"),
    ("8ac0c70fff57e9aefdf5edf44b51d62c2d433653cbb2cf5cc06bb115af04d221", "LINKUSD"),
    ("93da3352f9f1d105fdfe4971cfa80e9dd777bfc5d0f683ebb6e1294b92137bb7", "AVAXUSD"),
    ("ffd11c5a1cfd42f80afb2df4d9f264c15f956d68153335374ec10722edd70472", "POLUSD"),
    ("ec5d399846a9209f3fe5881d70aae9268c94339ff9817e8d18ff19fa05eea1c8", "XRPUSD"),
    ("dcef50dd0a4cd2dcc17e45df1676dcb336a11a61c69df7a0299b0150c672d25c", "DOGEUSD"),
    ("d69731a2e74ac1ce884fc3890f7ee324b6deb66147055249568869ed700882e4", "PEPEUSD"),
    ("2b9ab1e972a281585084148ba1389800799bd4be63b957507db1349314e47445", "AAVEUSD"),
    ("67aed5a24fdad045475e7195c98a98aea119c763f272d4523f5bac93a4f33c2b", "TRXUSD"),
    ("23d7315113f5b1d3ba7a83604c44b94d79f4fd69af77f804fc7f920a6dc65744", "SUIUSD"),
    ("4ca4beeca86f0d164160323817a4e42b10010a724c2217c6ee41b54cd4cc61fc", "WIFUSD"),
    ("09f7c1d7dfbb7df2b8fe3d3d87ee94a2259d212da4f30c1f0540d066dfa44723", "TIAUSD"),
    ("8963217838ab4cf5cadc172203c1f0b763fbaa45f346d8ee50ba994bbcac3026", "TONUSD"),
    ("c63e2a7f37a04e5e614c07238bedb25dcc38927fba8fe890597a593c0b2fa4ad", "LDOUSD"),
    ("3fa4252848f9f0a1480be62745a4629d9eb1322aebab8a791e344b3b9c1adcf5", "ARBUSD"),
    ("385f64d993f7b77d8182ed5003d97c60aa3361f3cecfe711544d2d59165e9bdf", "OPUSD"),
    ("193c739db502aadcef37c2589738b1e37bdb257d58cf1ab3c7ebc8e6df4e3ec0", "ORDIUSD"),
    ("b43660a5f790c69354b0729a5ef9d50d68f1df92107540210b9cccba1f947cc2", "JTOUSD"),
    ("0a0408d619e9380abad35060f9192039ed5042fa6f82301d0e48bb52be830996", "JUPUSD"),
    ("78d185a741d07edb3412b09008b7c5cfb9bbbd7d568bf00ba737b456ba171501", "UNIUSD"),
    ("d6f83dfeaff95d596ddec26af2ee32f391c206a183b161b7980821860eeef2f5", "OKBUSD"),
    ("b00b60f88b03a6a625a8d1c048c3f66653edf217439983d037e7222c4e612819", "ATOMUSD"),
    ("c415de8d2eba7db216527dff4b60e8f3a5311c740dadb233e13e12547e226750", "NEARUSD"),
    ("40440d18fb5ad809e2825ce7dfc035cfa57135c13062a04addafe0c7f54425e0", "SATSUSD"),
    ("d40472610abe56d36d065a0cf889fc8f1dd9f3b7f2a478231a5fc6df07ea5ce3", "ONDOUSD"),
];

/// Stream feed hash -> canonical symbol
pub static STREAM_PAIRS: LazyLock<HashMap<B256, CanonicalSymbol>> = LazyLock::new(|| {
    STREAM_FEED_IDS
        .iter()
        .filter_map(|(id, symbol)| {
            let hash = id.parse::<B256>().ok()?;
            Some((hash, CanonicalSymbol::from_concatenated(symbol)?))
        })
        .collect()
});

/// Translate a stream feed id (bare or `0x`-prefixed hex) into its canonical symbol.
///
/// Unknown or malformed ids yield `None`: the asset is not tracked.
pub fn stream_pair_symbol(feed_id: &str) -> Option<&'static CanonicalSymbol> {
    let hash = feed_id.trim().parse::<B256>().ok()?;
    STREAM_PAIRS.get(&hash)
}

/// All tracked stream feed ids as bare lower-case hex, in table order.
pub fn stream_feed_ids() -> Vec<String> {
    STREAM_FEED_IDS
        .iter()
        .filter_map(|(id, _)| id.parse::<B256>().ok())
        .map(hex::encode)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(text: &str) -> String {
        format!("0x{}", hex::encode(text.as_bytes()))
    }

    #[test]
    fn test_decode_short_string_hex() {
        assert_eq!(decode_short_string("0x4254432f555344").unwrap(), "BTC/USD");
        assert_eq!(decode_short_string(&pack("ETH/USD")).unwrap(), "ETH/USD");
    }

    #[test]
    fn test_decode_short_string_decimal() {
        // 0x4254432f555344
        assert_eq!(decode_short_string("18669995996566340").unwrap(), "BTC/USD");
    }

    #[test]
    fn test_decode_short_string_rejects_garbage() {
        assert!(decode_short_string("0xzz").is_err());
        assert!(decode_short_string("0x01").is_err());
        assert!(decode_short_string(&pack(&"A".repeat(32))).is_err());
    }

    #[test]
    fn test_push_symbol_is_canonical() {
        let sym = push_pair_symbol(&pack("btc/usd")).unwrap();
        assert_eq!(sym.as_str(), "BTC/USD");
        assert!(push_pair_symbol(&pack("BTCUSD")).is_err());
    }

    #[test]
    fn test_stream_table_complete() {
        assert_eq!(STREAM_PAIRS.len(), STREAM_FEED_IDS.len());
        assert_eq!(STREAM_PAIRS.len(), 29);
        assert_eq!(stream_feed_ids().len(), 29);
    }

    #[test]
    fn test_stream_table_symbols_are_split() {
        let symbols: Vec<&str> = STREAM_PAIRS.values().map(|s| s.as_str()).collect();
        assert!(symbols.contains(&"LINK/USD"));
        assert!(symbols.contains(&"SATS/USD"));
        assert!(symbols.iter().all(|s| s.ends_with("/USD") && !s.starts_with('/')));
    }

    #[test]
    fn test_stream_lookup_accepts_prefix_and_case() {
        let bare = "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43";
        let prefixed = format!("0x{}", bare.to_uppercase());

        assert_eq!(stream_pair_symbol(bare).unwrap().as_str(), "BTC/USD");
        assert_eq!(stream_pair_symbol(&prefixed).unwrap().as_str(), "BTC/USD");
    }

    #[test]
    fn test_stream_lookup_miss() {
        let unknown = "00".repeat(32);
        assert!(stream_pair_symbol(&unknown).is_none());
        assert!(stream_pair_symbol("not-a-hash").is_none());
        assert_eq!(STREAM_PAIRS.len(), 29);
    }

    #[test]
    fn test_both_translators_share_symbol_space() {
        let push = push_pair_symbol(&pack("BTC/USD")).unwrap();
        let stream = stream_pair_symbol(&stream_feed_ids()[0]).unwrap();
        assert_eq!(&push, stream);
    }
}
