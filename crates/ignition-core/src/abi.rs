//! ABI encoding and decoding.
//!
//! Thin layer over `ethers_core::abi` that speaks JSON values on one side and
//! calldata on the other. JSON conventions: addresses and byte strings are
//! `0x` hex, unsigned integers are numbers or decimal/hex strings, signed
//! integers are numbers or decimal strings, tuples are arrays.

use std::collections::BTreeMap;

use ethers_core::abi::{self, Abi, Event, Function, ParamType, RawLog, StateMutability, Token};
use ethers_core::types::{Address, Bytes, I256, U256};
use ethers_core::utils::keccak256;
use ignition_types::address::{address_to_string, parse_address};
use ignition_types::encoding::{hex_encode, json_to_u256, parse_hex_bytes, u256_to_json};
use ignition_types::{Artifact, EvmExecutionError, NameOrIndex, ReceiptLog};
use serde_json::Value;

use crate::errors::StrategyError;

pub type AbiResult<T> = Result<T, StrategyError>;

/// Selector of `Error(string)`.
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// Selector of `Panic(uint256)`.
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

pub fn parse_abi(artifact: &Artifact) -> AbiResult<Abi> {
    serde_json::from_value(artifact.abi.clone()).map_err(|e| {
        StrategyError::Abi(format!(
            "Invalid ABI in artifact {}: {}",
            artifact.contract_name, e
        ))
    })
}

// =============================================================================
// Lookup
// =============================================================================

/// Canonical `name(type,...)` signature.
pub fn function_signature(function: &Function) -> String {
    let types: Vec<String> = function.inputs.iter().map(|p| p.kind.to_string()).collect();
    format!("{}({})", function.name, types.join(","))
}

fn event_signature(event: &Event) -> String {
    let types: Vec<String> = event.inputs.iter().map(|p| p.kind.to_string()).collect();
    format!("{}({})", event.name, types.join(","))
}

/// Find a function by bare name or by full signature. A bare name that is
/// overloaded is an error listing the candidate signatures.
pub fn find_function<'a>(abi: &'a Abi, contract: &str, name: &str) -> AbiResult<&'a Function> {
    let bare = name.split('(').next().unwrap_or(name);
    let candidates: Vec<&Function> = abi
        .functions
        .get(bare)
        .map(|fs| fs.iter().collect())
        .unwrap_or_default();
    if name.contains('(') {
        return candidates
            .into_iter()
            .find(|f| function_signature(f) == name)
            .ok_or_else(|| {
                StrategyError::Abi(format!("Function {} not found in contract {}", name, contract))
            });
    }
    match candidates.as_slice() {
        [] => Err(StrategyError::Abi(format!(
            "Function {} not found in contract {}",
            name, contract
        ))),
        [one] => Ok(*one),
        many => Err(StrategyError::Abi(format!(
            "Function {} is overloaded in contract {}; use one of {}",
            name,
            contract,
            many.iter()
                .map(|f| function_signature(f))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

pub fn find_event<'a>(abi: &'a Abi, contract: &str, name: &str) -> AbiResult<&'a Event> {
    let bare = name.split('(').next().unwrap_or(name);
    let candidates: Vec<&Event> = abi
        .events
        .get(bare)
        .map(|es| es.iter().collect())
        .unwrap_or_default();
    if name.contains('(') {
        return candidates
            .into_iter()
            .find(|e| event_signature(e) == name)
            .ok_or_else(|| {
                StrategyError::Abi(format!("Event {} not found in contract {}", name, contract))
            });
    }
    match candidates.as_slice() {
        [] => Err(StrategyError::Abi(format!(
            "Event {} not found in contract {}",
            name, contract
        ))),
        [one] => Ok(*one),
        _ => Err(StrategyError::Abi(format!(
            "Event {} is overloaded in contract {}; use its full signature",
            name, contract
        ))),
    }
}

pub fn is_read_only(function: &Function) -> bool {
    matches!(
        function.state_mutability,
        StateMutability::View | StateMutability::Pure
    )
}

pub fn is_payable(function: &Function) -> bool {
    matches!(function.state_mutability, StateMutability::Payable)
}

/// `ethers_core::abi::Constructor` carries no mutability, so read it from the JSON.
pub fn constructor_is_payable(artifact: &Artifact) -> bool {
    artifact
        .abi
        .as_array()
        .into_iter()
        .flatten()
        .filter(|entry| entry.get("type").and_then(Value::as_str) == Some("constructor"))
        .any(|entry| {
            entry.get("stateMutability").and_then(Value::as_str) == Some("payable")
                || entry.get("payable").and_then(Value::as_bool) == Some(true)
        })
}

pub fn constructor_input_count(abi: &Abi) -> usize {
    abi.constructor.as_ref().map_or(0, |c| c.inputs.len())
}

// =============================================================================
// JSON <-> tokens
// =============================================================================

pub fn json_to_token(value: &Value, kind: &ParamType) -> Result<Token, String> {
    let mismatch = || format!("expected {}, got {}", kind, value);
    match kind {
        ParamType::Address => value
            .as_str()
            .and_then(parse_address)
            .map(Token::Address)
            .ok_or_else(mismatch),
        ParamType::Uint(_) => json_to_u256(value).map(Token::Uint).ok_or_else(mismatch),
        ParamType::Int(_) => json_to_i256(value).map(Token::Int).ok_or_else(mismatch),
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(Token::Bool(*b)),
            Value::String(s) if s == "true" || s == "false" => Ok(Token::Bool(s == "true")),
            _ => Err(mismatch()),
        },
        ParamType::String => value
            .as_str()
            .map(|s| Token::String(s.to_string()))
            .ok_or_else(mismatch),
        ParamType::Bytes => {
            let s = value.as_str().ok_or_else(mismatch)?;
            parse_hex_bytes(s, "bytes")
                .map(Token::Bytes)
                .map_err(|e| e.to_string())
        }
        ParamType::FixedBytes(len) => {
            let s = value.as_str().ok_or_else(mismatch)?;
            let bytes = parse_hex_bytes(s, "fixed bytes").map_err(|e| e.to_string())?;
            if bytes.len() != *len {
                return Err(format!("expected {} bytes, got {}", len, bytes.len()));
            }
            Ok(Token::FixedBytes(bytes))
        }
        ParamType::Array(inner) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .map(|v| json_to_token(v, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::Array)
        }
        ParamType::FixedArray(inner, len) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            if items.len() != *len {
                return Err(format!("expected {} items, got {}", len, items.len()));
            }
            items
                .iter()
                .map(|v| json_to_token(v, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::FixedArray)
        }
        ParamType::Tuple(kinds) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            if items.len() != kinds.len() {
                return Err(format!(
                    "expected a tuple of {} items, got {}",
                    kinds.len(),
                    items.len()
                ));
            }
            items
                .iter()
                .zip(kinds)
                .map(|(v, k)| json_to_token(v, k))
                .collect::<Result<Vec<_>, _>>()
                .map(Token::Tuple)
        }
    }
}

fn json_to_i256(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_i64().map(|i| I256::from(i).into_raw()),
        Value::String(s) if s.starts_with("0x") => json_to_u256(value),
        Value::String(s) => I256::from_dec_str(s.trim()).ok().map(I256::into_raw),
        _ => None,
    }
}

pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(a) => Value::String(address_to_string(a)),
        Token::Uint(u) => u256_to_json(*u),
        Token::Int(raw) => {
            let signed = I256::from_raw(*raw);
            match signed.to_string().parse::<i64>() {
                Ok(small) => Value::from(small),
                Err(_) => Value::String(signed.to_string()),
            }
        }
        Token::Bool(b) => Value::Bool(*b),
        Token::String(s) => Value::String(s.clone()),
        Token::Bytes(b) | Token::FixedBytes(b) => Value::String(hex_encode(b)),
        Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

fn tokens_for(
    what: &str,
    params: &[abi::Param],
    args: &[Value],
) -> AbiResult<Vec<Token>> {
    if params.len() != args.len() {
        return Err(StrategyError::Abi(format!(
            "{} expects {} arguments but {} were given",
            what,
            params.len(),
            args.len()
        )));
    }
    params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (param, arg))| {
            json_to_token(arg, &param.kind).map_err(|reason| {
                let label = if param.name.is_empty() {
                    format!("#{}", i)
                } else {
                    param.name.clone()
                };
                StrategyError::Abi(format!("Invalid argument {} of {}: {}", label, what, reason))
            })
        })
        .collect()
}

// =============================================================================
// Encoding
// =============================================================================

/// Replace every library placeholder in the creation bytecode.
///
/// `libraries` is keyed by library name or `source:name`.
pub fn link_bytecode(artifact: &Artifact, libraries: &BTreeMap<String, Address>) -> AbiResult<Vec<u8>> {
    let mut code = artifact
        .bytecode
        .strip_prefix("0x")
        .unwrap_or(&artifact.bytecode)
        .to_string();
    for (source, libs) in &artifact.link_references {
        for (lib, refs) in libs {
            let qualified = format!("{}:{}", source, lib);
            let address = libraries
                .get(lib)
                .or_else(|| libraries.get(&qualified))
                .ok_or_else(|| {
                    StrategyError::Abi(format!(
                        "Missing library {} for contract {}",
                        qualified, artifact.contract_name
                    ))
                })?;
            let hex = format!("{:x}", address);
            for r in refs {
                let (start, end) = (r.start * 2, (r.start + r.length) * 2);
                if end > code.len() || r.length != 20 {
                    return Err(StrategyError::Abi(format!(
                        "Invalid link reference for {} in {}",
                        qualified, artifact.contract_name
                    )));
                }
                code.replace_range(start..end, &hex);
            }
        }
    }
    parse_hex_bytes(&code, "bytecode").map_err(|e| {
        StrategyError::Abi(format!(
            "Invalid bytecode for {}: {}",
            artifact.contract_name, e
        ))
    })
}

/// Linked creation code followed by the encoded constructor arguments.
pub fn encode_deployment(
    artifact: &Artifact,
    libraries: &BTreeMap<String, Address>,
    args: &[Value],
) -> AbiResult<Bytes> {
    let abi = parse_abi(artifact)?;
    let code = link_bytecode(artifact, libraries)?;
    let what = format!("the constructor of {}", artifact.contract_name);
    match &abi.constructor {
        Some(constructor) => {
            let tokens = tokens_for(&what, &constructor.inputs, args)?;
            constructor
                .encode_input(code, &tokens)
                .map(Bytes::from)
                .map_err(|e| StrategyError::Abi(format!("Failed to encode {}: {}", what, e)))
        }
        None if args.is_empty() => Ok(Bytes::from(code)),
        None => Err(StrategyError::Abi(format!(
            "{} expects 0 arguments but {} were given",
            what,
            args.len()
        ))),
    }
}

pub fn encode_function_call(
    artifact: &Artifact,
    function_name: &str,
    args: &[Value],
) -> AbiResult<Bytes> {
    let abi = parse_abi(artifact)?;
    let function = find_function(&abi, &artifact.contract_name, function_name)?;
    let what = format!("{}.{}", artifact.contract_name, function_signature(function));
    let tokens = tokens_for(&what, &function.inputs, args)?;
    function
        .encode_input(&tokens)
        .map(Bytes::from)
        .map_err(|e| StrategyError::Abi(format!("Failed to encode {}: {}", what, e)))
}

// =============================================================================
// Decoding
// =============================================================================

fn select<'a, T>(
    items: &'a [T],
    name_of: impl Fn(&T) -> &str,
    selector: &NameOrIndex,
) -> Option<&'a T> {
    match selector {
        NameOrIndex::Index(i) => items.get(*i),
        NameOrIndex::Name(name) => items.iter().find(|item| name_of(item) == name),
    }
}

/// Decode one output of a successful static call.
pub fn decode_static_call_result(
    artifact: &Artifact,
    function_name: &str,
    return_data: &[u8],
    name_or_index: &NameOrIndex,
) -> AbiResult<Value> {
    let abi = parse_abi(artifact)?;
    let function = find_function(&abi, &artifact.contract_name, function_name)?;
    let what = format!("the result of {}.{}", artifact.contract_name, function_name);
    let tokens = function
        .decode_output(return_data)
        .map_err(|e| StrategyError::Decode {
            what: what.clone(),
            reason: e.to_string(),
        })?;
    let named: Vec<(&str, &Token)> = function
        .outputs
        .iter()
        .map(|p| p.name.as_str())
        .zip(tokens.iter())
        .collect();
    select(&named, |(name, _)| *name, name_or_index)
        .map(|(_, token)| token_to_json(token))
        .ok_or_else(|| StrategyError::Decode {
            what,
            reason: format!("no output {}", name_or_index),
        })
}

/// Read one argument of the `event_index`-th matching event from `logs`.
pub fn decode_event_argument(
    artifact: &Artifact,
    event_name: &str,
    event_index: usize,
    name_or_index: &NameOrIndex,
    emitter: Address,
    logs: &[ReceiptLog],
) -> AbiResult<Value> {
    let abi = parse_abi(artifact)?;
    let event = find_event(&abi, &artifact.contract_name, event_name)?;
    let topic = event.signature();
    let log = logs
        .iter()
        .filter(|log| log.address == emitter)
        .filter(|log| event.anonymous || log.topics.first() == Some(&topic))
        .nth(event_index)
        .ok_or_else(|| StrategyError::Decode {
            what: format!("event {}", event_name),
            reason: format!(
                "event number {} emitted by {} not found in the transaction",
                event_index,
                address_to_string(&emitter)
            ),
        })?;
    let parsed = event
        .parse_log(RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        })
        .map_err(|e| StrategyError::Decode {
            what: format!("event {}", event_name),
            reason: e.to_string(),
        })?;
    select(&parsed.params, |p| p.name.as_str(), name_or_index)
        .map(|p| token_to_json(&p.value))
        .ok_or_else(|| StrategyError::Decode {
            what: format!("event {}", event_name),
            reason: format!("no argument {}", name_or_index),
        })
}

/// Human-readable name of a Solidity panic code.
pub fn panic_name(code: U256) -> &'static str {
    if code > U256::from(0xffu64) {
        return "UNKNOWN_PANIC_CODE";
    }
    match code.as_u64() {
        0x00 => "GENERIC_PANIC",
        0x01 => "ASSERTION_ERROR",
        0x11 => "ARITHMETIC_UNDER_OR_OVERFLOW",
        0x12 => "DIVISION_OR_MODULO_BY_ZERO",
        0x21 => "ENUM_CONVERSION_OUT_OF_BOUNDS",
        0x22 => "INCORRECTLY_ENCODED_STORAGE_BYTE_ARRAY",
        0x31 => "POP_ON_EMPTY_ARRAY",
        0x32 => "ARRAY_ACCESS_OUT_OF_BOUNDS",
        0x41 => "TOO_MUCH_MEMORY_ALLOCATED",
        0x51 => "ZERO_INITIALIZED_VARIABLE",
        _ => "UNKNOWN_PANIC_CODE",
    }
}

/// Classify revert data. Custom errors are looked up in `abi` when given; a
/// known custom error whose arguments fail to decode is a strategy error.
pub fn decode_error(data: &[u8], abi: Option<&Abi>) -> AbiResult<EvmExecutionError> {
    if data.is_empty() {
        return Ok(EvmExecutionError::RevertWithoutReason);
    }
    let invalid = || EvmExecutionError::RevertWithInvalidData {
        data: Bytes::from(data.to_vec()),
    };
    if data.len() < 4 {
        return Ok(invalid());
    }
    let (selector, payload) = data.split_at(4);

    if selector == ERROR_SELECTOR {
        return Ok(match abi::decode(&[ParamType::String], payload) {
            Ok(tokens) => match tokens.into_iter().next() {
                Some(Token::String(message)) => EvmExecutionError::RevertWithReason { message },
                _ => invalid(),
            },
            Err(_) => invalid(),
        });
    }
    if selector == PANIC_SELECTOR {
        return Ok(match abi::decode(&[ParamType::Uint(256)], payload) {
            Ok(tokens) => match tokens.into_iter().next() {
                Some(Token::Uint(code)) => EvmExecutionError::RevertWithPanicCode {
                    code,
                    name: panic_name(code).to_string(),
                },
                _ => invalid(),
            },
            Err(_) => invalid(),
        });
    }

    let custom = abi.and_then(|abi| {
        abi.errors.values().flatten().find(|error| {
            let types: Vec<String> = error.inputs.iter().map(|p| p.kind.to_string()).collect();
            let signature = format!("{}({})", error.name, types.join(","));
            keccak256(signature.as_bytes())[..4] == *selector
        })
    });
    match custom {
        Some(error) => {
            let kinds: Vec<ParamType> = error.inputs.iter().map(|p| p.kind.clone()).collect();
            let tokens = abi::decode(&kinds, payload).map_err(|e| StrategyError::Decode {
                what: format!("custom error {}", error.name),
                reason: e.to_string(),
            })?;
            Ok(EvmExecutionError::RevertWithCustomError {
                name: error.name.clone(),
                args: Value::Array(tokens.iter().map(token_to_json).collect()),
            })
        }
        None => Ok(EvmExecutionError::RevertWithUnknownCustomError {
            signature: hex_encode(selector),
            data: Bytes::from(data.to_vec()),
        }),
    }
}

/// Revert data for a `revert("message")`.
pub fn encode_revert_reason(message: &str) -> Bytes {
    let mut data = ERROR_SELECTOR.to_vec();
    data.extend(abi::encode(&[Token::String(message.to_string())]));
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::H256;
    use ignition_types::LinkReference;
    use serde_json::json;

    fn artifact(abi: Value, bytecode: &str) -> Artifact {
        Artifact {
            contract_name: "Token".to_string(),
            source_name: "contracts/Token.sol".to_string(),
            abi,
            bytecode: bytecode.to_string(),
            deployed_bytecode: String::new(),
            link_references: Default::default(),
        }
    }

    fn token_abi() -> Value {
        json!([
            {"type": "constructor", "stateMutability": "nonpayable",
             "inputs": [{"name": "supply", "type": "uint256"}]},
            {"type": "function", "name": "mint", "stateMutability": "nonpayable",
             "inputs": [{"name": "to", "type": "address"}, {"name": "amount", "type": "uint256"}],
             "outputs": []},
            {"type": "function", "name": "owner", "stateMutability": "view",
             "inputs": [], "outputs": [{"name": "", "type": "address"}]},
            {"type": "function", "name": "pair", "stateMutability": "view",
             "inputs": [], "outputs": [{"name": "a", "type": "uint256"}, {"name": "b", "type": "int256"}]},
            {"type": "function", "name": "set", "stateMutability": "nonpayable",
             "inputs": [{"name": "v", "type": "uint256"}], "outputs": []},
            {"type": "function", "name": "set", "stateMutability": "nonpayable",
             "inputs": [{"name": "v", "type": "address"}], "outputs": []},
            {"type": "event", "name": "Minted", "anonymous": false,
             "inputs": [{"name": "to", "type": "address", "indexed": true},
                        {"name": "amount", "type": "uint256", "indexed": false}]},
            {"type": "error", "name": "NotOwner", "inputs": [{"name": "who", "type": "address"}]}
        ])
    }

    #[test]
    fn test_encode_deployment_appends_constructor_args() {
        let a = artifact(token_abi(), "0x6080");
        let data = encode_deployment(&a, &BTreeMap::new(), &[json!(5)]).unwrap();
        assert_eq!(data.len(), 2 + 32);
        assert_eq!(data[33], 5);
        let err = encode_deployment(&a, &BTreeMap::new(), &[]).unwrap_err();
        assert!(err.to_string().contains("expects 1 arguments"));
    }

    #[test]
    fn test_encode_call_and_overloads() {
        let a = artifact(token_abi(), "0x");
        let data = encode_function_call(
            &a,
            "mint",
            &[json!("0x0000000000000000000000000000000000000001"), json!("7")],
        )
        .unwrap();
        assert_eq!(data.len(), 4 + 64);
        let err = encode_function_call(&a, "set", &[json!(1)]).unwrap_err();
        assert!(err.to_string().contains("set(uint256)"), "{err}");
        assert!(encode_function_call(&a, "set(uint256)", &[json!(1)]).is_ok());
        assert!(encode_function_call(&a, "burn", &[]).is_err());
    }

    #[test]
    fn test_link_bytecode() {
        let mut a = artifact(json!([]), &format!("0x60{}60", "_".repeat(40)));
        a.link_references = BTreeMap::from([(
            "contracts/Math.sol".to_string(),
            BTreeMap::from([(
                "Math".to_string(),
                vec![LinkReference { start: 1, length: 20 }],
            )]),
        )]);
        assert!(link_bytecode(&a, &BTreeMap::new()).is_err());
        let libs = BTreeMap::from([("Math".to_string(), Address::from_low_u64_be(0xab))]);
        let code = link_bytecode(&a, &libs).unwrap();
        assert_eq!(code.len(), 22);
        assert_eq!(code[20], 0xab);
        assert_eq!(code[21], 0x60);
    }

    #[test]
    fn test_decode_static_call_by_name_and_index() {
        let a = artifact(token_abi(), "0x");
        let data = abi::encode(&[
            Token::Uint(U256::from(9)),
            Token::Int(I256::from(-3).into_raw()),
        ]);
        assert_eq!(
            decode_static_call_result(&a, "pair", &data, &NameOrIndex::Name("a".into())).unwrap(),
            json!(9)
        );
        assert_eq!(
            decode_static_call_result(&a, "pair", &data, &NameOrIndex::Index(1)).unwrap(),
            json!(-3)
        );
        assert!(decode_static_call_result(&a, "pair", &data, &NameOrIndex::Index(2)).is_err());
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_error(&[], None).unwrap(), EvmExecutionError::RevertWithoutReason);
        assert_eq!(
            decode_error(&encode_revert_reason("nope"), None).unwrap(),
            EvmExecutionError::RevertWithReason {
                message: "nope".to_string()
            }
        );

        let mut panic = PANIC_SELECTOR.to_vec();
        panic.extend(abi::encode(&[Token::Uint(U256::from(0x11))]));
        assert_eq!(
            decode_error(&panic, None).unwrap(),
            EvmExecutionError::RevertWithPanicCode {
                code: U256::from(0x11),
                name: "ARITHMETIC_UNDER_OR_OVERFLOW".to_string()
            }
        );

        let abi = parse_abi(&artifact(token_abi(), "0x")).unwrap();
        let mut custom = keccak256(b"NotOwner(address)")[..4].to_vec();
        custom.extend(abi::encode(&[Token::Address(Address::from_low_u64_be(1))]));
        assert!(matches!(
            decode_error(&custom, Some(&abi)).unwrap(),
            EvmExecutionError::RevertWithCustomError { ref name, .. } if name == "NotOwner"
        ));
        assert!(matches!(
            decode_error(&custom, None).unwrap(),
            EvmExecutionError::RevertWithUnknownCustomError { .. }
        ));

        let truncated = &custom[..8];
        assert!(matches!(
            decode_error(truncated, Some(&abi)),
            Err(StrategyError::Decode { .. })
        ));
        assert!(matches!(
            decode_error(&[1, 2], None).unwrap(),
            EvmExecutionError::RevertWithInvalidData { .. }
        ));
    }

    #[test]
    fn test_decode_event_argument() {
        let a = artifact(token_abi(), "0x");
        let emitter = Address::from_low_u64_be(0xe);
        let topic0 = H256::from(keccak256(b"Minted(address,uint256)"));
        let to = H256::from_low_u64_be(0x42);
        let log = ReceiptLog {
            address: emitter,
            topics: vec![topic0, to],
            data: Bytes::from(abi::encode(&[Token::Uint(U256::from(77))])),
        };
        let logs = vec![log];
        assert_eq!(
            decode_event_argument(&a, "Minted", 0, &NameOrIndex::Name("amount".into()), emitter, &logs)
                .unwrap(),
            json!(77)
        );
        assert_eq!(
            decode_event_argument(&a, "Minted", 0, &NameOrIndex::Index(0), emitter, &logs).unwrap(),
            json!("0x0000000000000000000000000000000000000042")
        );
        assert!(decode_event_argument(&a, "Minted", 1, &NameOrIndex::Index(0), emitter, &logs).is_err());
        assert!(decode_event_argument(
            &a,
            "Minted",
            0,
            &NameOrIndex::Index(0),
            Address::from_low_u64_be(1),
            &logs
        )
        .is_err());
    }

    #[test]
    fn test_mutability_helpers() {
        let a = artifact(token_abi(), "0x");
        let abi = parse_abi(&a).unwrap();
        assert!(is_read_only(find_function(&abi, "Token", "owner").unwrap()));
        assert!(!is_read_only(find_function(&abi, "Token", "mint").unwrap()));
        assert!(!constructor_is_payable(&a));
        assert_eq!(constructor_input_count(&abi), 1);
    }
}
