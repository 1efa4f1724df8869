//! 3483 keyboard, 102 key layout
//!
//! Pause (12), Play (10), Rule (98) and the two blank keypad keys have no
//! function in the default plane.

use super::{Key, Keymap, ModifierRelease, CENT, CENTER_PERIOD, BROKEN_BAR, NOT, SPACE};
use super::Key::Char;

const DEFAULT: &[(u8, Key)] = &[
    // Function keys
    (7, Key::Pf(1)),
    (15, Key::Pf(2)),
    (23, Key::Pf(3)),
    (31, Key::Pf(4)),
    (39, Key::Pf(5)),
    (47, Key::Pf(6)),
    (55, Key::Pf(7)),
    (63, Key::Pf(8)),
    (71, Key::Pf(9)),
    (79, Key::Pf(10)),
    (86, Key::Pf(11)),
    (94, Key::Pf(12)),
    // Control keys
    (5, Key::Attn),
    (6, Key::Clear),
    (4, Key::CursorSelect),
    (3, Key::ExtendSelect),
    (11, Key::EraseEof),
    (131, Key::Print),
    (1, Key::Print),
    (9, Key::Ctrl),
    // First row
    (14, Char('`')),
    (22, Char('1')),
    (30, Char('2')),
    (38, Char('3')),
    (37, Char('4')),
    (46, Char('5')),
    (54, Char('6')),
    (61, Char('7')),
    (62, Char('8')),
    (70, Char('9')),
    (69, Char('0')),
    (78, Char('-')),
    (85, Char('=')),
    (102, Key::Backspace),
    // Second row
    (13, Key::Tab),
    (21, Char('q')),
    (29, Char('w')),
    (36, Char('e')),
    (45, Char('r')),
    (44, Char('t')),
    (53, Char('y')),
    (60, Char('u')),
    (67, Char('i')),
    (68, Char('o')),
    (77, Char('p')),
    (84, CENT),
    (91, Char('\\')),
    (90, Key::Newline),
    // Third row
    (20, Key::CapsLock),
    (28, Char('a')),
    (27, Char('s')),
    (35, Char('d')),
    (43, Char('f')),
    (52, Char('g')),
    (51, Char('h')),
    (59, Char('j')),
    (66, Char('k')),
    (75, Char('l')),
    (76, Char(';')),
    (82, Char('\'')),
    (83, Char('{')),
    // Fourth row
    (18, Key::LeftShift),
    (19, Char('<')),
    (26, Char('z')),
    (34, Char('x')),
    (33, Char('c')),
    (42, Char('v')),
    (50, Char('b')),
    (49, Char('n')),
    (58, Char('m')),
    (65, Char(',')),
    (73, Char('.')),
    (74, Char('/')),
    (89, Key::RightShift),
    // Bottom row
    (17, Key::Reset),
    (25, Key::LeftAlt),
    (41, SPACE),
    (57, Key::RightAlt),
    (88, Key::Enter),
    // Center
    (103, Key::Insert),
    (110, Key::Home),
    (111, Key::Jump),
    (100, Key::Delete),
    (101, Key::EraseEof),
    (109, Key::Delete),
    (99, Key::Up),
    (97, Key::Left),
    (106, Key::Right),
    (96, Key::Down),
    // Number pad
    (126, Char(',')),
    (132, SPACE),
    (108, Char('7')),
    (117, Char('8')),
    (125, Char('9')),
    (124, Key::Tab),
    (107, Char('4')),
    (115, Char('5')),
    (116, Char('6')),
    (123, Char('-')),
    (105, Char('1')),
    (114, Char('2')),
    (122, Char('3')),
    (121, Key::Enter),
    (112, Char('0')),
    (113, Char('.')),
];

const SHIFT: &[(u8, Key)] = &[
    (7, Key::Pf(13)),
    (15, Key::Pf(14)),
    (23, Key::Pf(15)),
    (31, Key::Pf(16)),
    (39, Key::Pf(17)),
    (47, Key::Pf(18)),
    (55, Key::Pf(19)),
    (63, Key::Pf(20)),
    (71, Key::Pf(21)),
    (79, Key::Pf(22)),
    (86, Key::Pf(23)),
    (94, Key::Pf(24)),
    (14, Char('~')),
    (22, Char('|')),
    (30, Char('@')),
    (38, Char('#')),
    (37, Char('$')),
    (46, Char('%')),
    (54, NOT),
    (61, Char('&')),
    (62, Char('*')),
    (70, Char('(')),
    (69, Char(')')),
    (78, Char('_')),
    (85, Char('+')),
    (13, Key::Backtab),
    (21, Char('Q')),
    (29, Char('W')),
    (36, Char('E')),
    (45, Char('R')),
    (44, Char('T')),
    (53, Char('Y')),
    (60, Char('U')),
    (67, Char('I')),
    (68, Char('O')),
    (77, Char('P')),
    (84, Char('!')),
    (91, BROKEN_BAR),
    (28, Char('A')),
    (27, Char('S')),
    (35, Char('D')),
    (43, Char('F')),
    (52, Char('G')),
    (51, Char('H')),
    (59, Char('J')),
    (66, Char('K')),
    (75, Char('L')),
    (76, Char(':')),
    (82, Char('"')),
    (83, Char('}')),
    (19, Char('>')),
    (26, Char('Z')),
    (34, Char('X')),
    (33, Char('C')),
    (42, Char('V')),
    (50, Char('B')),
    (49, Char('N')),
    (58, Char('M')),
    (65, Char(',')),
    (73, CENTER_PERIOD),
    (74, Char('?')),
    (103, Key::Dup),
    (110, Key::FieldMark),
    (111, Key::Pa(3)),
];

const ALT: &[(u8, Key)] = &[
    (5, Key::SysRq),
    (12, Key::EraseInput),
    (131, Key::Ident),
    (10, Key::Test),
    (103, Key::Pa(1)),
    (110, Key::Pa(2)),
    (97, Key::Left2),
    (98, Key::Home),
    (106, Key::Right2),
];

pub const KEYMAP: Keymap = Keymap {
    name: "3483_102",
    default: DEFAULT,
    shift: SHIFT,
    alt: ALT,
    modifier_release: ModifierRelease::Code(240),
};
