//! 3278 typewriter keyboard

use super::{Key, Keymap, ModifierRelease, CENT, CENTER_PERIOD, BROKEN_BAR, NOT, SPACE};
use super::Key::Char;

const DEFAULT: &[(u8, Key)] = &[
    // Control keys
    (80, Key::Attn),
    (81, Key::CursorSelect),
    (84, Key::CursorBlink),
    (85, Key::EraseEof),
    (86, Key::Print),
    (87, Key::Clicker),
    // First row
    (61, Char('`')),
    (33, Char('1')),
    (34, Char('2')),
    (35, Char('3')),
    (36, Char('4')),
    (37, Char('5')),
    (38, Char('6')),
    (39, Char('7')),
    (40, Char('8')),
    (41, Char('9')),
    (32, Char('0')),
    (48, Char('-')),
    (17, Char('=')),
    (49, Key::Backspace),
    // Second row
    (54, Key::Tab),
    (112, Char('q')),
    (118, Char('w')),
    (100, Char('e')),
    (113, Char('r')),
    (115, Char('t')),
    (120, Char('y')),
    (116, Char('u')),
    (104, Char('i')),
    (110, Char('o')),
    (111, Char('p')),
    (27, CENT),
    (21, Char('\\')),
    (53, Key::Backtab),
    // Third row
    (76, Key::CapsLock),
    (96, Char('a')),
    (114, Char('s')),
    (99, Char('d')),
    (101, Char('f')),
    (102, Char('g')),
    (103, Char('h')),
    (105, Char('j')),
    (106, Char('k')),
    (107, Char('l')),
    (126, Char(';')),
    (18, Char('\'')),
    (15, Char('{')),
    (8, Key::Newline),
    // Fourth row
    (77, Key::LeftShift),
    (9, Char('<')),
    (121, Char('z')),
    (119, Char('x')),
    (98, Char('c')),
    (117, Char('v')),
    (97, Char('b')),
    (109, Char('n')),
    (108, Char('m')),
    (51, Char(',')),
    (50, Char('.')),
    (20, Char('/')),
    (78, Key::RightShift),
    // Bottom row
    (52, Key::Reset),
    (16, SPACE),
    (79, Key::RightAlt),
    (24, Key::Enter),
    // Right
    (95, Key::Dup),
    (94, Key::FieldMark),
    (12, Key::Insert),
    (13, Key::Delete),
    (14, Key::Up),
    (19, Key::Down),
    (22, Key::Left),
    (26, Key::Right),
];

const SHIFT: &[(u8, Key)] = &[
    (61, Char('~')),
    (33, Char('|')),
    (34, Char('@')),
    (35, Char('#')),
    (36, Char('$')),
    (37, Char('%')),
    (38, NOT),
    (39, Char('&')),
    (40, Char('*')),
    (41, Char('(')),
    (32, Char(')')),
    (48, Char('_')),
    (17, Char('+')),
    (112, Char('Q')),
    (118, Char('W')),
    (100, Char('E')),
    (113, Char('R')),
    (115, Char('T')),
    (120, Char('Y')),
    (116, Char('U')),
    (104, Char('I')),
    (110, Char('O')),
    (111, Char('P')),
    (27, Char('!')),
    (21, BROKEN_BAR),
    (96, Char('A')),
    (114, Char('S')),
    (99, Char('D')),
    (101, Char('F')),
    (102, Char('G')),
    (103, Char('H')),
    (105, Char('J')),
    (106, Char('K')),
    (107, Char('L')),
    (126, Char(':')),
    (18, Char('"')),
    (15, Char('}')),
    (9, Char('>')),
    (121, Char('Z')),
    (119, Char('X')),
    (98, Char('C')),
    (117, Char('V')),
    (97, Char('B')),
    (109, Char('N')),
    (108, Char('M')),
    (51, Char(',')),
    (50, CENTER_PERIOD),
    (20, Char('?')),
];

const ALT: &[(u8, Key)] = &[
    (80, Key::SysRq),
    (81, Key::Clear),
    (83, Key::EraseInput),
    (84, Key::AltCursor),
    (86, Key::Ident),
    (87, Key::Test),
    (33, Key::Pf(1)),
    (34, Key::Pf(2)),
    (35, Key::Pf(3)),
    (36, Key::Pf(4)),
    (37, Key::Pf(5)),
    (38, Key::Pf(6)),
    (39, Key::Pf(7)),
    (40, Key::Pf(8)),
    (41, Key::Pf(9)),
    (32, Key::Pf(10)),
    (48, Key::Pf(11)),
    (17, Key::Pf(12)),
    (53, Key::Home),
    (95, Key::Pa(1)),
    (94, Key::Pa(2)),
    (22, Key::Left2),
    (26, Key::Right2),
];

const RELEASE: &[(u8, Key)] = &[
    (204, Key::CapsLock),
    (205, Key::LeftShift),
    (206, Key::RightShift),
    (207, Key::RightAlt),
];

pub const KEYMAP: Keymap = Keymap {
    name: "3278 Typewriter",
    default: DEFAULT,
    shift: SHIFT,
    alt: ALT,
    modifier_release: ModifierRelease::Map(RELEASE),
};
