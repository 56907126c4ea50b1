use super::{
    Chip8, Chip8Error, Chip8Result, DISPLAY_X, DISPLAY_Y, FONT_START_ADDRESS, GLYPH_HEIGHT, Opcode,
    OpcodeALU,
};
use crate::u4;

impl Chip8 {
    /// Applies one instruction. The program counter already points past it.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<Chip8Result, Chip8Error> {
        match opcode {
            Opcode::ClearDisplay => {
                self.display.clear();
                return Ok(Chip8Result::WaitForNextFrame);
            }
            Opcode::Jump { nnn } => {
                self.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                self.pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                self.push(self.pc)?;
                log::debug!("call {:#05X} from {:#05X}", nnn, self.fetch_pc());
                self.pc = nnn;
            }
            Opcode::Return => {
                self.pc = self.pop()?;
                log::debug!("return to {:#05X}", self.pc);
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                self.skip_if(self.v[x] == nn);
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                self.skip_if(self.v[x] != nn);
            }
            Opcode::SkipRegEqualReg { x, y } => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = rand::random();
                self.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                let key = u4::from_low_bits(self.v[x]);
                self.skip_if(self.keypad.is_pressed(key));
            }
            Opcode::SkipIfNotPressed { x } => {
                let key = u4::from_low_bits(self.v[x]);
                self.skip_if(!self.keypad.is_pressed(key));
            }
            Opcode::WaitForKey { x } => {
                return Ok(self.execute_wait_for_key(x));
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.timers.delay();
            }
            Opcode::SetDelayTimer { x } => {
                self.timers.set_delay(self.v[x]);
            }
            Opcode::SetSoundTimer { x } => {
                self.timers.set_sound(self.v[x]);
            }
            Opcode::FontChar { x } => {
                let digit = u16::from(self.v[x] & 0x0F);
                self.i = FONT_START_ADDRESS as u16 + digit * GLYPH_HEIGHT;
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                let digits = [value / 100, (value / 10) % 10, value % 10];
                self.mem_range_mut(self.i, digits.len())?.copy_from_slice(&digits);
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                let regs = self.v;
                self.mem_range_mut(self.i, count)?.copy_from_slice(&regs[..count]);
                self.advance_index_after_transfer(x);
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let mut block = [0; 16];
                block[..count].copy_from_slice(self.mem_range(self.i, count)?);
                self.v[..count].copy_from_slice(&block[..count]);
                self.advance_index_after_transfer(x);
            }
            Opcode::Unknown(opcode) => {
                return Err(Chip8Error::UnknownOpcode {
                    opcode,
                    pc: self.fetch_pc(),
                });
            }
        };

        Ok(Chip8Result::Continue)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    fn advance_index_after_transfer(&mut self, x: u4) {
        if self.quirks.load_store_increments_i {
            self.i = self.i.wrapping_add(u16::from(x.get()) + 1);
        }
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => self.v[x] |= self.v[y],
            OpcodeALU::And => self.v[x] &= self.v[y],
            OpcodeALU::Xor => self.v[x] ^= self.v[y],
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = u8::from(overflow);
            }
            OpcodeALU::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = u8::from(!borrow); // Notice that borrow is inverted
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = res;
                self.v[0xF] = u8::from(!borrow);
            }
            OpcodeALU::ShiftRight => {
                let src = self.shift_source(x, y);
                self.v[x] = src >> 1;
                self.v[0xF] = src & 1;
            }
            OpcodeALU::ShiftLeft => {
                let src = self.shift_source(x, y);
                self.v[x] = src << 1;
                self.v[0xF] = src >> 7;
            }
        }
    }

    fn shift_source(&self, x: u4, y: u4) -> u8 {
        if self.quirks.shift_uses_vx {
            self.v[x]
        } else {
            self.v[y]
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<Chip8Result, Chip8Error> {
        let x_pos = usize::from(self.v[x]) % DISPLAY_X;
        let y_pos = usize::from(self.v[y]) % DISPLAY_Y;

        // Sprites are clipped at the right and bottom edges, not wrapped
        let row_count = usize::from(n).min(DISPLAY_Y - y_pos);
        let col_count = 8usize.min(DISPLAY_X - x_pos);

        // Only the rows that land on screen are read; a fault leaves the display untouched
        let mut sprite = [0; 15];
        sprite[..row_count].copy_from_slice(self.mem_range(self.i, row_count)?);

        let mut any_erased = false;
        for (row, &sprite_byte) in sprite[..row_count].iter().enumerate() {
            for col in 0..col_count {
                if sprite_byte & (0x80 >> col) != 0 {
                    any_erased |= self.display.toggle(x_pos + col, y_pos + row);
                }
            }
        }

        self.v[0xF] = u8::from(any_erased);
        Ok(Chip8Result::WaitForNextFrame)
    }

    fn execute_wait_for_key(&mut self, x: u4) -> Chip8Result {
        match self.keypad.first_pressed() {
            Some(key) => {
                self.v[x] = key.get();
                Chip8Result::Continue
            }
            None => {
                // Repeat this instruction until a key is down
                self.pc = self.pc.wrapping_sub(2);
                Chip8Result::WaitForNextFrame
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip8::Quirks;

    fn machine(program: &[u8]) -> Chip8 {
        machine_with(program, Quirks::default())
    }

    fn machine_with(program: &[u8], quirks: Quirks) -> Chip8 {
        let mut chip8 = Chip8::with_quirks(quirks);
        chip8.load(program).unwrap();
        chip8
    }

    fn run(chip8: &mut Chip8, cycles: usize) {
        for _ in 0..cycles {
            chip8.cpu_cycle().unwrap();
        }
    }

    #[test]
    fn add_immediate_after_set() {
        for x in 0..16u8 {
            let mut chip8 = machine(&[0x60 | x, 0x10, 0x70 | x, 0x05]);
            run(&mut chip8, 2);
            assert_eq!(chip8.v[usize::from(x)], 0x15);
        }
    }

    #[test]
    fn add_immediate_wraps_without_flag() {
        let mut chip8 = machine(&[0x61, 0xFF, 0x71, 0x02]);
        chip8.v[0xF] = 0x42;
        run(&mut chip8, 2);
        assert_eq!(chip8.v[1], 0x01);
        assert_eq!(chip8.v[0xF], 0x42);
    }

    #[test]
    fn add_registers_sets_carry() {
        let mut chip8 = machine(&[0x60, 0xFF, 0x61, 0x01, 0x80, 0x14]);
        run(&mut chip8, 3);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0x00, 1));

        let mut chip8 = machine(&[0x60, 0x01, 0x61, 0x01, 0x80, 0x14]);
        run(&mut chip8, 3);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0x02, 0));
    }

    #[test]
    fn sub_registers_sets_not_borrow() {
        let mut chip8 = machine(&[0x60, 0x05, 0x61, 0x03, 0x80, 0x15]);
        run(&mut chip8, 3);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0x02, 1));

        let mut chip8 = machine(&[0x60, 0x03, 0x61, 0x05, 0x80, 0x15]);
        run(&mut chip8, 3);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0xFE, 0));
    }

    #[test]
    fn reverse_sub_sets_not_borrow() {
        let mut chip8 = machine(&[0x60, 0x03, 0x61, 0x05, 0x80, 0x17]);
        run(&mut chip8, 3);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0x02, 1));

        let mut chip8 = machine(&[0x60, 0x05, 0x61, 0x03, 0x80, 0x17]);
        run(&mut chip8, 3);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0xFE, 0));
    }

    #[test]
    fn bitwise_ops_leave_flag_alone() {
        let mut chip8 = machine(&[
            0x60, 0b1100, 0x61, 0b1010, 0x62, 0b1100, 0x63, 0b1100, 0x64, 0x00, //
            0x80, 0x11, 0x82, 0x12, 0x83, 0x13, 0x84, 0x10,
        ]);
        chip8.v[0xF] = 7;
        run(&mut chip8, 9);
        assert_eq!(chip8.v[0], 0b1110);
        assert_eq!(chip8.v[2], 0b1000);
        assert_eq!(chip8.v[3], 0b0110);
        assert_eq!(chip8.v[4], 0b1010);
        assert_eq!(chip8.v[0xF], 7);
    }

    #[test]
    fn shifts_read_vy_by_default() {
        let mut chip8 = machine(&[0x61, 0b1000_0011, 0x80, 0x16, 0x82, 0x1E]);
        run(&mut chip8, 2);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0b0100_0001, 1));
        run(&mut chip8, 1);
        assert_eq!((chip8.v[2], chip8.v[0xF]), (0b0000_0110, 1));
    }

    #[test]
    fn shifts_read_vx_with_quirk() {
        let quirks = Quirks {
            shift_uses_vx: true,
            ..Quirks::default()
        };
        let mut chip8 = machine_with(&[0x60, 0b0000_0010, 0x61, 0xFF, 0x80, 0x16], quirks);
        run(&mut chip8, 3);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0b0000_0001, 0));

        let mut chip8 = machine_with(&[0x60, 0b0100_0000, 0x80, 0x1E], quirks);
        run(&mut chip8, 2);
        assert_eq!((chip8.v[0], chip8.v[0xF]), (0b1000_0000, 0));
    }

    #[test]
    fn shift_flag_wins_when_target_is_vf() {
        let mut chip8 = machine(&[0x61, 0x01, 0x8F, 0x16]);
        run(&mut chip8, 2);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn skips_compare_against_immediate_and_register() {
        // 3XNN taken, 4XNN not taken, 5XY0 taken, 9XY0 not taken
        let mut chip8 = machine(&[
            0x60, 0x07, 0x30, 0x07, 0x00, 0x00, 0x40, 0x07, 0x61, 0x07, //
            0x50, 0x10, 0x00, 0x00, 0x90, 0x10,
        ]);
        run(&mut chip8, 2);
        assert_eq!(chip8.pc, 0x206);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc, 0x208);
        run(&mut chip8, 2);
        assert_eq!(chip8.pc, 0x20E);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc, 0x210);
    }

    #[test]
    fn call_and_return() {
        // 0x200: call 0x206; 0x202: v0 := 1; 0x206: return
        let mut chip8 = machine(&[0x22, 0x06, 0x60, 0x01, 0x00, 0x00, 0x00, 0xEE]);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc, 0x206);
        assert_eq!(chip8.stack(), &[0x202]);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc, 0x202);
        assert!(chip8.stack().is_empty());
    }

    #[test]
    fn return_on_empty_stack_faults() {
        let mut chip8 = machine(&[0x00, 0xEE]);
        assert_eq!(
            chip8.cpu_cycle(),
            Err(Chip8Error::StackUnderflow { pc: 0x200 })
        );
    }

    #[test]
    fn unbounded_recursion_faults() {
        // 0x200: call 0x200
        let mut chip8 = machine(&[0x22, 0x00]);
        run(&mut chip8, crate::chip8::STACK_SIZE);
        assert_eq!(
            chip8.cpu_cycle(),
            Err(Chip8Error::StackOverflow { pc: 0x200 })
        );
    }

    #[test]
    fn jumps() {
        let mut chip8 = machine(&[0x13, 0x00]);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc, 0x300);

        let mut chip8 = machine(&[0x60, 0x10, 0xB3, 0x00]);
        run(&mut chip8, 2);
        assert_eq!(chip8.pc, 0x310);
    }

    #[test]
    fn random_is_masked() {
        let mut chip8 = machine(&[0xC0, 0x00, 0xC1, 0x0F]);
        run(&mut chip8, 2);
        assert_eq!(chip8.v[0], 0);
        assert_eq!(chip8.v[1] & 0xF0, 0);
    }

    #[test]
    fn index_instructions() {
        let mut chip8 = machine(&[0xA1, 0x23, 0x60, 0x10, 0xF0, 0x1E, 0x61, 0x1B, 0xF1, 0x29]);
        run(&mut chip8, 1);
        assert_eq!(chip8.i, 0x123);
        run(&mut chip8, 2);
        assert_eq!(chip8.i, 0x133);
        run(&mut chip8, 2);
        assert_eq!(chip8.i, 5 * 0xB);
    }

    #[test]
    fn bcd_writes_three_digits() {
        let mut chip8 = machine(&[0x60, 123, 0xA3, 0x00, 0xF0, 0x33]);
        run(&mut chip8, 3);
        assert_eq!(chip8.memory(0x300, 3), &[1, 2, 3]);
    }

    #[test]
    fn store_then_load_restores_registers() {
        let mut chip8 = machine(&[0xA3, 0x00, 0xF3, 0x55, 0xF3, 0x65]);
        chip8.v[..4].copy_from_slice(&[9, 8, 7, 6]);
        run(&mut chip8, 2);
        assert_eq!(chip8.memory(0x300, 4), &[9, 8, 7, 6]);
        assert_eq!(chip8.i, 0x300);

        chip8.v[..4].fill(0);
        chip8.v[4] = 0x55;
        run(&mut chip8, 1);
        assert_eq!(&chip8.v[..5], &[9, 8, 7, 6, 0x55]);
        assert_eq!(chip8.i, 0x300);
    }

    #[test]
    fn load_past_end_of_memory_leaves_registers_alone() {
        // i := 0xFFE, load v3
        let mut chip8 = machine(&[0xAF, 0xFE, 0xF3, 0x65]);
        chip8.v[..4].fill(9);
        run(&mut chip8, 1);
        assert_eq!(
            chip8.cpu_cycle(),
            Err(Chip8Error::MemoryOutOfBounds {
                address: 0x1000,
                pc: 0x202
            })
        );
        assert_eq!(&chip8.v[..4], &[9; 4]);
        assert_eq!(chip8.i, 0xFFE);
    }

    #[test]
    fn store_and_bcd_past_end_of_memory_write_nothing() {
        // i := 0xFFE, save v3
        let mut chip8 = machine(&[0xAF, 0xFE, 0xF3, 0x55]);
        chip8.v[..4].fill(9);
        run(&mut chip8, 1);
        assert!(matches!(
            chip8.cpu_cycle(),
            Err(Chip8Error::MemoryOutOfBounds { .. })
        ));
        assert_eq!(chip8.memory(0xFFE, 2), &[0, 0]);

        // v0 := 255, i := 0xFFE, bcd v0
        let mut chip8 = machine(&[0x60, 0xFF, 0xAF, 0xFE, 0xF0, 0x33]);
        run(&mut chip8, 2);
        assert!(matches!(
            chip8.cpu_cycle(),
            Err(Chip8Error::MemoryOutOfBounds { .. })
        ));
        assert_eq!(chip8.memory(0xFFE, 2), &[0, 0]);
    }

    #[test]
    fn store_advances_index_with_quirk() {
        let quirks = Quirks {
            load_store_increments_i: true,
            ..Quirks::default()
        };
        let mut chip8 = machine_with(&[0xA3, 0x00, 0xF2, 0x55, 0xF1, 0x65], quirks);
        run(&mut chip8, 2);
        assert_eq!(chip8.i, 0x303);
        run(&mut chip8, 1);
        assert_eq!(chip8.i, 0x305);
    }

    #[test]
    fn draw_clips_at_right_edge() {
        // v0 := 60, i := 0x300, sprite v0 v1 1
        let mut chip8 = machine(&[0x60, 60, 0xA3, 0x00, 0xD0, 0x11]);
        chip8.memory[0x300] = 0xFF;
        run(&mut chip8, 3);
        assert_eq!(chip8.display.lit_count(), 4);
        assert!((60..64).all(|x| chip8.get_display_pixel(0, x)));
        assert!(!chip8.get_display_pixel(0, 0));
        assert!(!chip8.get_display_pixel(1, 0));
    }

    #[test]
    fn draw_clips_at_bottom_edge() {
        // v1 := 30, i := font 0, sprite v0 v1 5
        let mut chip8 = machine(&[0x61, 30, 0xA0, 0x00, 0xD0, 0x15]);
        run(&mut chip8, 3);
        assert_eq!(chip8.display.lit_count(), 4 + 2);
        assert!(chip8.display.rows().take(30).flatten().all(|&c| !c));
    }

    #[test]
    fn draw_wraps_start_coordinates() {
        let mut chip8 = machine(&[0x60, 64 + 2, 0x61, 32 + 1, 0xA3, 0x00, 0xD0, 0x11]);
        chip8.memory[0x300] = 0x80;
        run(&mut chip8, 4);
        assert!(chip8.get_display_pixel(1, 2));
        assert_eq!(chip8.display.lit_count(), 1);
    }

    #[test]
    fn redraw_erases_and_reports_collision() {
        let mut chip8 = machine(&[0xA0, 0x00, 0xD0, 0x05, 0xD0, 0x05]);
        run(&mut chip8, 2);
        assert!(chip8.display.lit_count() > 0);
        assert_eq!(chip8.v[0xF], 0);
        assert!(chip8.take_draw_dirty());

        assert_eq!(chip8.cpu_cycle(), Ok(Chip8Result::WaitForNextFrame));
        assert_eq!(chip8.display.lit_count(), 0);
        assert_eq!(chip8.v[0xF], 1);
        assert!(chip8.take_draw_dirty());
    }

    #[test]
    fn collision_flag_covers_whole_sprite() {
        // First row collides, second does not: VF stays 1
        let mut chip8 = machine(&[0xA3, 0x00, 0xD0, 0x01, 0xD0, 0x02]);
        chip8.memory[0x300] = 0x80;
        chip8.memory[0x301] = 0x80;
        run(&mut chip8, 3);
        assert_eq!(chip8.v[0xF], 1);
        assert!(!chip8.get_display_pixel(0, 0));
        assert!(chip8.get_display_pixel(1, 0));
    }

    #[test]
    fn sprite_past_end_of_memory_draws_nothing() {
        // i := 0xFFF, sprite v0 v0 3
        let mut chip8 = machine(&[0xAF, 0xFF, 0xD0, 0x03]);
        chip8.memory[0xFFF] = 0xFF;
        chip8.v[0xF] = 0x42;
        run(&mut chip8, 1);
        assert!(matches!(
            chip8.cpu_cycle(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000, .. })
        ));
        assert_eq!(chip8.display.lit_count(), 0);
        assert!(!chip8.take_draw_dirty());
        assert_eq!(chip8.v[0xF], 0x42);
    }

    #[test]
    fn clipped_rows_are_not_read() {
        // v1 := 31, i := 0xFFF, sprite v0 v1 3: only the row on screen is fetched
        let mut chip8 = machine(&[0x61, 31, 0xAF, 0xFF, 0xD0, 0x13]);
        chip8.memory[0xFFF] = 0x80;
        run(&mut chip8, 3);
        assert!(chip8.get_display_pixel(31, 0));
        assert_eq!(chip8.display.lit_count(), 1);
    }

    #[test]
    fn clear_display() {
        let mut chip8 = machine(&[0xA0, 0x00, 0xD0, 0x05, 0x00, 0xE0]);
        run(&mut chip8, 2);
        chip8.take_draw_dirty();
        run(&mut chip8, 1);
        assert_eq!(chip8.display.lit_count(), 0);
        assert!(chip8.take_draw_dirty());
    }

    #[test]
    fn key_skips() {
        let mut chip8 = machine(&[0x60, 0x0A, 0xE0, 0x9E, 0x00, 0x00, 0xE0, 0xA1]);
        chip8.set_key(u4::new(0xA), true);
        run(&mut chip8, 2);
        assert_eq!(chip8.pc, 0x206);
        run(&mut chip8, 1);
        assert_eq!(chip8.pc, 0x208);

        let mut chip8 = machine(&[0x60, 0x0A, 0xE0, 0xA1]);
        run(&mut chip8, 2);
        assert_eq!(chip8.pc, 0x206);
    }

    #[test]
    fn wait_for_key_polls_until_pressed() {
        let mut chip8 = machine(&[0xF5, 0x0A]);
        for _ in 0..3 {
            assert_eq!(chip8.cpu_cycle(), Ok(Chip8Result::WaitForNextFrame));
            assert_eq!(chip8.pc, 0x200);
        }

        chip8.set_key(u4::new(0x7), true);
        assert_eq!(chip8.cpu_cycle(), Ok(Chip8Result::Continue));
        assert_eq!(chip8.pc, 0x202);
        assert_eq!(chip8.v[5], 0x7);
    }

    #[test]
    fn delay_timer_round_trip() {
        let mut chip8 = machine(&[0x60, 3, 0xF0, 0x15, 0xF1, 0x07, 0xF1, 0x07]);
        run(&mut chip8, 2);
        for expected in [2, 1, 0, 0] {
            chip8.timers_cycle();
            assert_eq!(chip8.timers().delay(), expected);
        }
        run(&mut chip8, 1);
        assert_eq!(chip8.v[1], 0);
    }

    #[test]
    fn sound_timer_drives_beep() {
        let mut chip8 = machine(&[0x60, 1, 0xF0, 0x18]);
        run(&mut chip8, 2);
        assert!(chip8.should_beep());
        chip8.timers_cycle();
        assert!(!chip8.should_beep());
    }

    #[test]
    fn unknown_opcode_reports_fetch_address() {
        let mut chip8 = machine(&[0x60, 0x01, 0xFF, 0xFF]);
        run(&mut chip8, 1);
        assert_eq!(
            chip8.cpu_cycle(),
            Err(Chip8Error::UnknownOpcode {
                opcode: 0xFFFF,
                pc: 0x202
            })
        );
        assert_eq!(chip8.pc, 0x204);
    }
}
