// Integration tests for the ACE reader: parse/dump round trips and JXS
// pointer consistency.

use helios::ace::{
    shift_jxs_array, AceTable, Block, BlockType, EszBlock, ItceBlock, ItieBlock, JXS_SIZE,
    NXS_SIZE,
};

fn empty_table(zaid: &str) -> AceTable {
    AceTable {
        zaid: zaid.to_string(),
        awr: 0.9992,
        temperature: 2.5301e-8,
        date: "08/02/2026".to_string(),
        comment: "thermal scattering test table".to_string(),
        source_info: "mat125".to_string(),
        nxs: [0; NXS_SIZE],
        jxs: [0; JXS_SIZE],
        blocks: Vec::new(),
    }
}

/// A table with only the principal grid and the thermal inelastic grid,
/// five energies each.
fn esz_itie_table() -> AceTable {
    let mut table = empty_table("lwtr.10t");
    table.blocks = vec![
        Block::Esz(EszBlock {
            energy: vec![1e-5, 1e-4, 1e-3, 1e-2, 1e-1],
            total: vec![40.0, 30.0, 20.0, 10.0, 5.0],
            absorption: vec![2.0, 1.5, 1.0, 0.5, 0.25],
            elastic: vec![38.0, 28.5, 19.0, 9.5, 4.75],
            heating: vec![0.0, 0.1, 0.2, 0.3, 0.4],
        }),
        Block::Itie(ItieBlock {
            energy: vec![1e-5, 5e-5, 1e-4, 5e-4, 1e-3],
            sigma_in: vec![20.0, 18.0, 15.0, 10.0, 8.0],
        }),
    ];
    table.update_pointers();
    table
}

#[test]
fn test_esz_itie_round_trip_is_field_equal() {
    let table = esz_itie_table();
    let text = table.write();
    let reparsed = AceTable::parse(&text).unwrap();
    // Bitwise equality on every field, header and payload alike
    assert_eq!(reparsed, table);

    // And a second generation reproduces the text itself
    assert_eq!(reparsed.write(), text);
}

#[test]
fn test_payload_length_is_sum_of_block_sizes() {
    let table = esz_itie_table();
    let (nxs, _, xss) = table.reassemble();
    let total: usize = table.blocks.iter().map(Block::size).sum();
    assert_eq!(nxs[0] as usize, total);
    assert_eq!(xss.len(), total);
    // ESZ is 5 arrays of 5; ITIE is 2 * 5 + 1
    assert_eq!(total, 25 + 11);
}

#[test]
fn test_jxs_pointers_are_prefix_sums() {
    let table = esz_itie_table();
    let (_, jxs, _) = table.reassemble();
    // ESZ dumps first at word 1; ITIE starts right after ESZ's 25 words
    assert_eq!(jxs[BlockType::Esz.jxs_slot()], 1);
    assert_eq!(jxs[BlockType::Itie.jxs_slot()], 26);
    // Absent blocks stay absent
    assert_eq!(jxs[BlockType::Nu.jxs_slot()], 0);
    assert_eq!(jxs[BlockType::Itce.jxs_slot()], 0);
}

#[test]
fn test_shift_propagates_through_later_pointers() {
    // Three blocks laid out back to back; growing the middle one shifts
    // only what follows it.
    let mut table = esz_itie_table();
    table.blocks.push(Block::Itce(ItceBlock {
        energy: vec![1e-5, 1e-3],
        sigma_el: vec![4.0, 2.0],
    }));
    table.update_pointers();
    let jxs_old = table.jxs;

    let grown = 4i64;
    let mut jxs_new = jxs_old;
    shift_jxs_array(&jxs_old, &mut jxs_new, BlockType::Itie.jxs_slot(), grown);

    // ESZ sits before ITIE: unchanged
    assert_eq!(
        jxs_new[BlockType::Esz.jxs_slot()],
        jxs_old[BlockType::Esz.jxs_slot()]
    );
    // ITIE's own pointer does not move
    assert_eq!(
        jxs_new[BlockType::Itie.jxs_slot()],
        jxs_old[BlockType::Itie.jxs_slot()]
    );
    // ITCE sits after ITIE: shifted by the growth
    assert_eq!(
        jxs_new[BlockType::Itce.jxs_slot()],
        jxs_old[BlockType::Itce.jxs_slot()] + grown
    );
    // Absent slots stay zero
    assert_eq!(jxs_new[BlockType::Sig.jxs_slot()], 0);
}

#[test]
fn test_edit_then_round_trip() {
    // Append a point to the thermal grid, re-layout, write, reparse: the
    // edited table survives the trip.
    let mut table = esz_itie_table();
    if let Some(Block::Itie(itie)) = table
        .blocks
        .iter_mut()
        .find(|b| b.block_type() == BlockType::Itie)
    {
        itie.energy.push(2e-3);
        itie.sigma_in.push(6.5);
    } else {
        panic!("thermal grid missing");
    }
    table.update_pointers();

    let reparsed = AceTable::parse(&table.write()).unwrap();
    assert_eq!(reparsed, table);
    match reparsed.block(BlockType::Itie) {
        Some(Block::Itie(itie)) => {
            assert_eq!(itie.energy.len(), 6);
            assert_eq!(itie.size(), 13);
        }
        other => panic!("unexpected block {other:?}"),
    }
}

#[test]
fn test_multiple_tables_round_trip() {
    let a = esz_itie_table();
    let mut b = esz_itie_table();
    b.zaid = "grph.10t".to_string();
    b.comment = "second table".to_string();

    let text = format!("{}{}", a.write(), b.write());
    let tables = AceTable::parse_all(&text).unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0], a);
    assert_eq!(tables[1], b);
}
