mod tests {
    use fountainq::decoder::Decoder;
    use fountainq::encoder::{Encoder, EncoderConfig, SolverKind};
    use fountainq::error::FountainError;
    use fountainq::oti::{PayloadId, MAX_ESI};

    use rand::prelude::*;
    use std::collections::HashSet;

    pub fn init() {
        std::env::set_var("RUST_LOG", "debug");
        env_logger::builder().is_test(true).try_init().ok();
    }

    fn config(symbol_size: u16, max_memory: usize) -> EncoderConfig {
        EncoderConfig {
            symbol_size,
            symbol_alignment: 1,
            min_sub_symbol_size: symbol_size,
            max_memory,
            solver: SolverKind::Inactivation,
        }
    }

    fn object(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    /// Feed the decoder every encoding symbol of every block except the
    /// dropped ESIs, then decode and compare against the object.
    fn transfer(
        data: &[u8],
        encoder: &Encoder,
        nb_repair: u32,
        dropped: &HashSet<(u8, u32)>,
    ) -> Result<Vec<u8>, FountainError> {
        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific()).unwrap();

        let mut symbol = vec![0u8; encoder.symbol_size() as usize];
        for block in encoder.iter() {
            let sbn = block.sbn();
            let symbols = block.source_symbols().chain(block.repair_symbols(nb_repair));
            for symbol_ref in symbols {
                let esi = symbol_ref.payload_id().esi;
                if dropped.contains(&(sbn, esi)) {
                    continue;
                }
                symbol_ref.encode_into(&mut symbol).unwrap();
                decoder.add_symbol(sbn, esi, &symbol)?;
            }
        }

        let mut out = vec![0u8; data.len()];
        decoder.decode(&mut out)?;
        Ok(out)
    }

    #[test]
    pub fn single_symbol_object() {
        init();
        // F = 10, T = 10: one block of one symbol, ESI 0 is the object
        let data = object(10, 1);
        let encoder = Encoder::new(&data, config(10, 1024)).unwrap();
        assert_eq!(encoder.blocks(), 1);
        assert_eq!(encoder.symbols(0).unwrap(), 1);

        let mut symbol = vec![0u8; 10];
        assert_eq!(encoder.encode(0, 0, &mut symbol).unwrap(), 10);
        assert_eq!(symbol, data);

        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific()).unwrap();
        decoder.add_symbol(0, 0, &symbol).unwrap();
        let mut out = vec![0u8; 10];
        assert_eq!(decoder.decode(&mut out).unwrap(), 10);
        assert_eq!(out, data);
    }

    #[test]
    pub fn smallest_object() {
        init();
        let data = vec![0x42u8];
        let encoder = Encoder::new(&data, config(1, 1024)).unwrap();
        let dropped = HashSet::new();
        assert_eq!(transfer(&data, &encoder, 3, &dropped).unwrap(), data);
    }

    #[test]
    pub fn repairs_replace_dropped_source_symbols() {
        init();
        // F = 41, T = 8: 6 source symbols, the last one padded with zeros
        let data = object(41, 2);
        let encoder = Encoder::new(&data, config(8, 4096)).unwrap();
        assert_eq!(encoder.symbols(0).unwrap(), 6);

        // ESIs 0..=10 minus the two dropped source symbols: 9 received
        let dropped: HashSet<(u8, u32)> = [(0, 2), (0, 4)].into_iter().collect();
        let out = transfer(&data, &encoder, 5, &dropped).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    pub fn two_blocks_with_random_losses() {
        init();
        // F = 256, T = 16, memory bound forces Z = 2 blocks of 8 symbols
        let data = object(256, 3);
        let encoder = Encoder::new(&data, config(16, 200)).unwrap();
        assert_eq!(encoder.blocks(), 2);
        assert_eq!(encoder.symbols(0).unwrap(), 8);
        assert_eq!(encoder.symbols(1).unwrap(), 8);

        let mut rng = StdRng::seed_from_u64(33);
        for _ in 0..5 {
            // drop 4 of the 16 symbols of each block
            let mut dropped = HashSet::new();
            for sbn in 0..2u8 {
                let mut esis: Vec<u32> = (0..16).collect();
                esis.shuffle(&mut rng);
                dropped.extend(esis[..4].iter().map(|esi| (sbn, *esi)));
            }
            let out = transfer(&data, &encoder, 8, &dropped).unwrap();
            assert_eq!(out, data);
        }
    }

    #[test]
    pub fn large_object_with_uniform_losses() {
        init();
        // F = 1 MB, auto-partitioned under a 160 KiB working-memory bound
        let data = object(1_000_000, 4);
        let encoder = Encoder::new(&data, config(1024, 160 * 1024)).unwrap();
        assert!(encoder.blocks() > 1);
        encoder.precompute(0, false);

        let mut rng = StdRng::seed_from_u64(44);
        for _ in 0..3 {
            // 10 extra repair symbols per block, 5% loss spread uniformly
            let mut dropped = HashSet::new();
            for block in encoder.iter() {
                let k = block.nb_source_symbols() as u32;
                let sent = k + 10;
                let mut esis: Vec<u32> = (0..sent).collect();
                esis.shuffle(&mut rng);
                let losses = (sent as usize * 5) / 100;
                dropped.extend(esis[..losses].iter().map(|esi| (block.sbn(), *esi)));
            }
            let out = transfer(&data, &encoder, 10, &dropped).unwrap();
            assert_eq!(out, data);
        }
    }

    #[test]
    pub fn concurrent_encode_matches_single_threaded_oracle() {
        init();
        let data = object(256 * 1024, 5);
        let encoder = Encoder::new(&data, config(1024, 64 * 1024)).unwrap();
        let oracle = Encoder::new(&data, config(1024, 64 * 1024)).unwrap();
        let nb_blocks = encoder.blocks();

        let mut requests: Vec<(u8, u32)> = Vec::new();
        let mut rng = StdRng::seed_from_u64(55);
        for _ in 0..64 {
            let sbn = rng.gen_range(0..nb_blocks) as u8;
            let k = encoder.symbols(sbn).unwrap() as u32;
            requests.push((sbn, rng.gen_range(0..k + 1000)));
        }

        let mut outputs: Vec<Vec<(u8, u32, Vec<u8>)>> = std::thread::scope(|scope| {
            let workers: Vec<_> = requests
                .chunks(8)
                .map(|chunk| {
                    let encoder = &encoder;
                    scope.spawn(move || {
                        let mut produced = Vec::new();
                        let mut symbol = vec![0u8; 1024];
                        for (sbn, esi) in chunk {
                            encoder.encode(*sbn, *esi, &mut symbol).unwrap();
                            produced.push((*sbn, *esi, symbol.clone()));
                        }
                        produced
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let mut expected = vec![0u8; 1024];
        for (sbn, esi, symbol) in outputs.drain(..).flatten() {
            oracle.encode(sbn, esi, &mut expected).unwrap();
            assert_eq!(symbol, expected, "sbn {} esi {}", sbn, esi);
        }
    }

    #[test]
    pub fn oti_describes_the_partition() {
        init();
        let data = object(12345, 6);
        let encoder = Encoder::new(&data, config(64, 16 * 1024)).unwrap();
        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific()).unwrap();

        assert_eq!(decoder.blocks(), encoder.blocks());
        assert_eq!(decoder.symbol_size(), encoder.symbol_size());
        for sbn in 0..encoder.blocks() as u8 {
            assert_eq!(decoder.symbols(sbn).unwrap(), encoder.symbols(sbn).unwrap());
            assert_eq!(
                decoder.block_size(sbn).unwrap(),
                encoder.block_size(sbn).unwrap()
            );
        }
    }

    #[test]
    pub fn sub_block_interleaving_round_trip() {
        init();
        // T/Al = 8 units forced into 4 sub-blocks by the memory bound
        let data = object(320, 7);
        let cfg = EncoderConfig {
            symbol_size: 16,
            symbol_alignment: 2,
            min_sub_symbol_size: 4,
            max_memory: 100,
            solver: SolverKind::Inactivation,
        };
        let encoder = Encoder::new(&data, cfg).unwrap();
        assert!(encoder.oti().sub_blocks() > 1);

        let dropped: HashSet<(u8, u32)> = [(0, 0), (0, 3)].into_iter().collect();
        let out = transfer(&data, &encoder, 6, &dropped).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    pub fn both_partition_classes_across_256_blocks() {
        init();
        // Kt = 2555 symbols under a 10-symbol block bound: 251 blocks of 10
        // and 5 blocks of 9
        let data = object(10220, 8);
        let encoder = Encoder::new(&data, config(4, 40)).unwrap();
        assert_eq!(encoder.blocks(), 256);
        assert_eq!(encoder.symbols(0).unwrap(), 10);
        assert_eq!(encoder.symbols(255).unwrap(), 9);

        let dropped = HashSet::new();
        let out = transfer(&data, &encoder, 0, &dropped).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    pub fn esi_boundaries() {
        init();
        let data = object(100, 9);
        let encoder = Encoder::new(&data, config(10, 1024)).unwrap();
        let mut symbol = vec![0u8; 10];

        assert!(encoder.encode(0, MAX_ESI, &mut symbol).is_ok());
        assert_eq!(
            encoder.encode(0, MAX_ESI + 1, &mut symbol),
            Err(FountainError::EsiOutOfRange(MAX_ESI + 1))
        );
        assert_eq!(encoder.max_repair(0).unwrap(), MAX_ESI + 1 - 10);

        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific()).unwrap();
        assert!(decoder.add_symbol(0, MAX_ESI, &symbol).unwrap());
        assert_eq!(
            decoder.add_symbol(0, MAX_ESI + 1, &symbol),
            Err(FountainError::EsiOutOfRange(MAX_ESI + 1))
        );
    }

    #[test]
    pub fn add_symbol_is_idempotent_for_decoding() {
        init();
        let data = object(80, 10);
        let encoder = Encoder::new(&data, config(8, 1024)).unwrap();
        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific()).unwrap();

        let mut symbol = vec![0u8; 8];
        for esi in 0..10u32 {
            encoder.encode(0, esi, &mut symbol).unwrap();
            assert!(decoder.add_symbol(0, esi, &symbol).unwrap());
            // the duplicate is dropped without disturbing the state
            assert!(!decoder.add_symbol(0, esi, &symbol).unwrap());
        }

        let mut out = vec![0u8; 80];
        assert_eq!(decoder.decode(&mut out).unwrap(), 80);
        assert_eq!(out, data);
    }

    #[test]
    pub fn partial_decoding_drains_ready_blocks() {
        init();
        let data = object(256, 11);
        let encoder = Encoder::new(&data, config(16, 200)).unwrap();
        assert_eq!(encoder.blocks(), 2);
        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific()).unwrap();

        // feed only block 1
        let mut symbol = vec![0u8; 16];
        for esi in 0..8u32 {
            encoder.encode(1, esi, &mut symbol).unwrap();
            decoder.add_symbol(1, esi, &symbol).unwrap();
        }

        // the whole object is not available
        let mut out = vec![0u8; 256];
        assert!(decoder.decode(&mut out).is_err());

        // but block 1 is
        let mut block = vec![0u8; decoder.block_size(1).unwrap()];
        let written = decoder.decode_block(1, &mut block).unwrap();
        assert_eq!(written, 128);
        assert_eq!(&block[..written], &data[128..256]);
        assert_eq!(decoder.decoded_blocks(), vec![1]);
    }

    #[test]
    pub fn gauss_jordan_fallback_decodes_too() {
        init();
        let data = object(200, 12);
        let mut cfg = config(10, 4096);
        cfg.solver = SolverKind::GaussJordan;
        let encoder = Encoder::new(&data, cfg).unwrap();

        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific())
                .unwrap()
                .with_solver(SolverKind::GaussJordan);

        let mut symbol = vec![0u8; 10];
        // skip source symbols 0 and 1, use repairs instead
        for esi in 2..24u32 {
            encoder.encode(0, esi, &mut symbol).unwrap();
            decoder.add_symbol(0, esi, &symbol).unwrap();
        }
        let mut out = vec![0u8; 200];
        assert_eq!(decoder.decode(&mut out).unwrap(), 200);
        assert_eq!(out, data);
    }

    #[test]
    pub fn free_forgets_received_symbols() {
        init();
        let data = object(80, 13);
        let encoder = Encoder::new(&data, config(8, 1024)).unwrap();
        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific()).unwrap();

        let mut symbol = vec![0u8; 8];
        for esi in 0..10u32 {
            encoder.encode(0, esi, &mut symbol).unwrap();
            decoder.add_symbol(0, esi, &symbol).unwrap();
        }
        decoder.free(0);

        let mut out = vec![0u8; 80];
        assert_eq!(
            decoder.decode(&mut out),
            Err(FountainError::NeedMoreSymbols {
                received: 0,
                needed: 10
            })
        );
    }

    #[test]
    pub fn packed_identifiers_round_trip() {
        init();
        let data = object(160, 14);
        let encoder = Encoder::new(&data, config(8, 120)).unwrap();
        assert!(encoder.blocks() > 1);
        let decoder =
            Decoder::from_oti(encoder.oti_common(), encoder.oti_scheme_specific()).unwrap();

        let mut symbol = vec![0u8; 8];
        for block in encoder.iter() {
            for symbol_ref in block.source_symbols() {
                let id = symbol_ref.payload_id().pack();
                encoder.encode_id(id, &mut symbol).unwrap();
                decoder.add_symbol_id(id, &symbol).unwrap();
            }
        }

        let mut out = vec![0u8; 160];
        assert_eq!(decoder.decode(&mut out).unwrap(), 160);
        assert_eq!(out, data);

        let id = PayloadId::new(1, 3).pack();
        assert_eq!(PayloadId::unpack(id), PayloadId::new(1, 3));
    }
}
